use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::{Extension, Form, Json};
use relay_core::RequestSpan;
use relay_protocol::prelude::*;
use relay_protocol::routes;
use serde_json::{json, Value};
use tracing::{info, warn};

use relay_core::app_error::{on_span, AppError, AppResult};
use crate::SubmissionContext;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn index(
    State(context): State<SubmissionContext>,
    Extension(span): Extension<RequestSpan>,
) -> AppResult<Json<Vec<Product>>> {
    let products = context
        .shared
        .products
        .list()
        .await
        .map_err(on_span(&span))?;
    span.log_event("fetch products");
    Ok(Json(products))
}

/// Queues the message as pending, then forwards it to moderation and
/// answers with moderation's response text. The pending entry stays when
/// the forward fails.
pub(crate) async fn send_message(
    State(context): State<SubmissionContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<SendMessageForm>, FormRejection>,
) -> AppResult<String> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.log_kv([
        ("event", json!("extract message")),
        ("message", json!(form.message)),
    ]);

    context
        .shared
        .queues
        .enqueue(QueueName::Pending, &form.message)
        .await
        .map_err(on_span(&span))?;
    span.log_event("store message");

    let forward = ApproveMessageForm {
        message: form.message,
    };
    let response = context
        .moderation
        .post_form_traced(
            &context.shared.tracer,
            span.context().as_ref(),
            "admin_request",
            routes::APPROVE_MESSAGE,
            &forward,
        )
        .await
        .map_err(|err| {
            warn!(%err, "forward to moderation failed; pending entry left in place");
            let err = AppError::internal(format!("moderation unavailable: {err}"));
            span.record_error(&err.message);
            err
        })?;

    span.log_kv([
        ("event", json!("admin request/response")),
        ("response", json!(response)),
    ]);
    Ok(response)
}

/// Terminal sink of the approval callback.
pub(crate) async fn message_approved(
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<MessageApprovedForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    info!(approved_message = %form.approved_message, "approval received");
    span.log_kv([
        ("event", json!("message approved")),
        ("approved_message", json!(form.approved_message)),
    ]);
    Ok("Approval received")
}

pub(crate) async fn like_product(
    State(context): State<SubmissionContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<LikeProductForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.log_kv([
        ("event", json!("extract product_id")),
        ("product_id", json!(form.product_id)),
    ]);

    context
        .shared
        .products
        .like(form.product_id)
        .await
        .map_err(on_span(&span))?;
    span.log_kv([
        ("event", json!("update like_count")),
        ("product_id", json!(form.product_id)),
    ]);
    Ok("Product liked successfully")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use relay_core::client::PeerClient;
    use relay_core::trace::MemorySink;
    use relay_core::SharedClients;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::SubmissionApiBuilder;

    struct Harness {
        router: Router,
        shared: SharedClients,
        sink: MemorySink,
    }

    fn harness(moderation_url: &str) -> Harness {
        harness_with_timeout(moderation_url, None)
    }

    fn harness_with_timeout(moderation_url: &str, timeout: Option<Duration>) -> Harness {
        let sink = MemorySink::new();
        let shared = SharedClients::in_memory("submission", Arc::new(sink.clone()));
        let moderation =
            PeerClient::new("moderation", moderation_url, timeout).expect("client");
        let router =
            SubmissionApiBuilder::new(SubmissionContext::new(shared.clone(), moderation))
                .into_router();
        Harness {
            router,
            shared,
            sink,
        }
    }

    async fn post_form(router: Router, uri: &str, body: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request");
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn send_message_queues_and_returns_moderation_answer() {
        let moderation = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approve_message"))
            .and(header_exists("traceparent"))
            .and(body_string("message=hello"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("Message received successfully"),
            )
            .expect(1)
            .mount(&moderation)
            .await;

        let h = harness(&moderation.uri());
        let (status, body) = post_form(h.router, "/send_message", "message=hello").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message received successfully");

        let pending = h.shared.queues.read_all(QueueName::Pending).await.unwrap();
        assert_eq!(pending, vec!["hello"]);

        let request_span = &h.sink.spans_for_operation("send_message")[0];
        let outbound = &h.sink.spans_for_operation("admin_request")[0];
        assert_eq!(outbound.trace_id, request_span.trace_id);
        assert_eq!(
            outbound.parent_span_id.as_deref(),
            Some(request_span.span_id.as_str())
        );
        assert!(request_span.has_event("store message"));
    }

    #[tokio::test]
    async fn missing_message_is_rejected_before_queueing() {
        let moderation = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&moderation)
            .await;

        let h = harness(&moderation.uri());
        let (status, _) = post_form(h.router, "/send_message", "text=hello").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h
            .shared
            .queues
            .read_all(QueueName::Pending)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_accepted() {
        let moderation = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approve_message"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&moderation)
            .await;

        let h = harness(&moderation.uri());
        let (status, _) = post_form(h.router, "/send_message", "message=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            h.shared.queues.read_all(QueueName::Pending).await.unwrap(),
            vec![String::new()]
        );
    }

    #[tokio::test]
    async fn unreachable_moderation_leaves_pending_orphan() {
        let h = harness("http://127.0.0.1:9");
        let (status, _) = post_form(h.router, "/send_message", "message=hello").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let pending = h.shared.queues.read_all(QueueName::Pending).await.unwrap();
        assert_eq!(pending, vec!["hello"]);

        let outbound = &h.sink.spans_for_operation("admin_request")[0];
        assert_eq!(outbound.tag("error"), Some(&Value::from(true)));
        let request_span = &h.sink.spans_for_operation("send_message")[0];
        assert_eq!(request_span.tag("http.status_code"), Some(&Value::from(500)));
    }

    #[tokio::test]
    async fn slow_moderation_times_out_and_keeps_pending_entry() {
        let moderation = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/approve_message"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Message received successfully")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&moderation)
            .await;

        let h = harness_with_timeout(&moderation.uri(), Some(Duration::from_millis(50)));
        let (status, body) = post_form(h.router, "/send_message", "message=hello").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("did not answer in time"), "unexpected body: {body}");

        let pending = h.shared.queues.read_all(QueueName::Pending).await.unwrap();
        assert_eq!(pending, vec!["hello"]);
        let outbound = &h.sink.spans_for_operation("admin_request")[0];
        assert_eq!(outbound.tag("error"), Some(&Value::from(true)));
    }

    #[tokio::test]
    async fn moderation_error_status_is_a_server_error() {
        let moderation = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&moderation)
            .await;

        let h = harness(&moderation.uri());
        let (status, _) = post_form(h.router, "/send_message", "message=hello").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn approval_callback_is_acknowledged_on_the_span() {
        let h = harness("http://127.0.0.1:9");
        let (status, body) = post_form(
            h.router,
            "/message_approved",
            "approved_message=APPROVED%3A+hello",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Approval received");

        let span = &h.sink.spans_for_operation("message_approved")[0];
        assert!(span.has_event("message approved"));
        assert!(h
            .shared
            .queues
            .read_all(QueueName::Approved)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn like_product_increments_counter() {
        let h = harness("http://127.0.0.1:9");
        h.shared
            .products
            .insert(&Product {
                id: 7,
                name: "lamp".into(),
                like_count: 1,
            })
            .await
            .unwrap();

        let (status, body) = post_form(h.router, "/like_product", "product_id=7").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Product liked successfully");
        let product = h.shared.products.find(7).await.unwrap().expect("product");
        assert_eq!(product.like_count, 2);
    }

    #[tokio::test]
    async fn like_unknown_product_is_not_found() {
        let h = harness("http://127.0.0.1:9");
        let (status, body) = post_form(h.router, "/like_product", "product_id=99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("does not exist"));

        let span = &h.sink.spans_for_operation("like_product")[0];
        assert_eq!(span.tag("error"), Some(&Value::from(true)));
    }

    #[tokio::test]
    async fn index_lists_products() {
        let h = harness("http://127.0.0.1:9");
        h.shared
            .products
            .insert(&Product {
                id: 1,
                name: "chair".into(),
                like_count: 0,
            })
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        let response = h.router.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let products: Vec<Product> = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(products[0].name, "chair");
        assert!(h.sink.spans_for_operation("index")[0].has_event("fetch products"));
    }
}
