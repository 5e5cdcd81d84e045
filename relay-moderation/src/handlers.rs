use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::{Extension, Form, Json};
use relay_core::RequestSpan;
use relay_protocol::prelude::*;
use relay_protocol::routes;
use serde_json::{json, Value};
use tracing::{info, warn};

use relay_core::app_error::{on_span, AppResult};
use crate::ModerationContext;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Snapshot of the pending queue, oldest first.
pub(crate) async fn index(
    State(context): State<ModerationContext>,
    Extension(span): Extension<RequestSpan>,
) -> AppResult<Json<PendingMessages>> {
    let messages = context
        .shared
        .queues
        .read_all(QueueName::Pending)
        .await
        .map_err(on_span(&span))?;
    span.log_event("fetch messages");
    Ok(Json(PendingMessages { messages }))
}

/// Approves unconditionally, records the approved text and calls the
/// submitter back. The answer does not depend on the callback outcome.
pub(crate) async fn approve_message(
    State(context): State<ModerationContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<ApproveMessageForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.log_kv([
        ("event", json!("extract message")),
        ("message", json!(form.message)),
    ]);

    let approved_message = approve(&form.message);
    span.log_kv([
        ("event", json!("approve message")),
        ("approved_message", json!(approved_message)),
    ]);

    context
        .shared
        .queues
        .enqueue(QueueName::Approved, &approved_message)
        .await
        .map_err(on_span(&span))?;
    span.log_event("store approved message");

    let callback = MessageApprovedForm { approved_message };
    match context
        .submission
        .post_form_traced(
            &context.shared.tracer,
            span.context().as_ref(),
            "user_callback",
            routes::MESSAGE_APPROVED,
            &callback,
        )
        .await
    {
        Ok(_) => span.log_event("request to user"),
        Err(err) => {
            warn!(%err, "approval callback failed");
            span.set_tag("callback.failed", true);
            span.log_kv([
                ("event", json!("callback failed")),
                ("message", json!(err.to_string())),
            ]);
        }
    }

    info!(approved_message = %callback.approved_message, "message approved");
    Ok("Message received successfully")
}

pub(crate) async fn add_product(
    State(context): State<ModerationContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<ProductForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.set_tag("product_id", form.id);

    let product = Product::from(form);
    context
        .shared
        .products
        .insert(&product)
        .await
        .map_err(on_span(&span))?;
    info!(product_id = product.id, "product added");
    Ok("Product added successfully")
}

pub(crate) async fn update_product(
    State(context): State<ModerationContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<ProductForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.set_tag("product_id", form.id);

    context
        .shared
        .products
        .update(&Product::from(form))
        .await
        .map_err(on_span(&span))?;
    Ok("Product updated successfully")
}

pub(crate) async fn delete_product(
    State(context): State<ModerationContext>,
    Extension(span): Extension<RequestSpan>,
    payload: Result<Form<ProductIdForm>, FormRejection>,
) -> AppResult<&'static str> {
    let Form(form) = payload.map_err(on_span(&span))?;
    span.set_tag("product_id", form.id);

    context
        .shared
        .products
        .delete(form.id)
        .await
        .map_err(on_span(&span))?;
    info!(product_id = form.id, "product deleted");
    Ok("Product deleted successfully")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

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
    use crate::ModerationApiBuilder;

    const PARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    struct Harness {
        router: Router,
        shared: SharedClients,
        sink: MemorySink,
    }

    fn harness(submission_url: &str) -> Harness {
        let sink = MemorySink::new();
        let shared = SharedClients::in_memory("moderation", Arc::new(sink.clone()));
        let submission = PeerClient::new("submission", submission_url, None).expect("client");
        let router = ModerationApiBuilder::new(ModerationContext::new(shared.clone(), submission))
            .into_router();
        Harness {
            router,
            shared,
            sink,
        }
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String) {
        let response = router.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn form_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn approve_marks_queues_and_calls_back() {
        let submission = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message_approved"))
            .and(header_exists("traceparent"))
            .and(body_string("approved_message=APPROVED%3A+hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Approval received"))
            .expect(1)
            .mount(&submission)
            .await;

        let h = harness(&submission.uri());
        let mut request = form_request("/approve_message", "message=hello");
        request
            .headers_mut()
            .insert("traceparent", PARENT.parse().expect("header"));
        let (status, body) = send(h.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message received successfully");

        let approved = h.shared.queues.read_all(QueueName::Approved).await.unwrap();
        assert_eq!(approved, vec!["APPROVED: hello"]);

        let request_span = &h.sink.spans_for_operation("approve_message")[0];
        assert_eq!(request_span.trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(request_span.parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
        assert!(request_span.has_event("request to user"));

        let callback = &h.sink.spans_for_operation("user_callback")[0];
        assert_eq!(callback.trace_id, request_span.trace_id);
        assert_eq!(
            callback.parent_span_id.as_deref(),
            Some(request_span.span_id.as_str())
        );
    }

    #[tokio::test]
    async fn failed_callback_still_succeeds() {
        let h = harness("http://127.0.0.1:9");
        let (status, body) = send(h.router, form_request("/approve_message", "message=hi")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Message received successfully");

        assert_eq!(
            h.shared.queues.read_all(QueueName::Approved).await.unwrap(),
            vec!["APPROVED: hi"]
        );
        let request_span = &h.sink.spans_for_operation("approve_message")[0];
        assert_eq!(request_span.tag("callback.failed"), Some(&Value::from(true)));
        assert!(request_span.has_event("callback failed"));
    }

    #[tokio::test]
    async fn approve_without_message_is_rejected() {
        let h = harness("http://127.0.0.1:9");
        let (status, _) = send(h.router, form_request("/approve_message", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h
            .shared
            .queues
            .read_all(QueueName::Approved)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn index_shows_pending_snapshot() {
        let h = harness("http://127.0.0.1:9");
        h.shared
            .queues
            .enqueue(QueueName::Pending, "first")
            .await
            .unwrap();
        h.shared
            .queues
            .enqueue(QueueName::Pending, "second")
            .await
            .unwrap();

        let request = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        let (status, body) = send(h.router.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        let pending: PendingMessages = serde_json::from_str(&body).expect("json");
        assert_eq!(pending.messages, vec!["first", "second"]);

        assert_eq!(
            h.shared.queues.read_all(QueueName::Pending).await.unwrap().len(),
            2
        );
        assert!(h.sink.spans_for_operation("index")[0].has_event("fetch messages"));
    }

    #[tokio::test]
    async fn product_lifecycle() {
        let h = harness("http://127.0.0.1:9");

        let (status, _) = send(
            h.router.clone(),
            form_request("/add_product", "id=1&name=lamp&like_count=0"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            h.router.clone(),
            form_request("/add_product", "id=1&name=lamp&like_count=0"),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("already exists"));

        let (status, body) = send(
            h.router.clone(),
            form_request("/update_product", "id=1&name=desk+lamp&like_count=3"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Product updated successfully");
        let product = h.shared.products.find(1).await.unwrap().expect("product");
        assert_eq!(product.name, "desk lamp");
        assert_eq!(product.like_count, 3);

        let (status, _) = send(h.router.clone(), form_request("/delete_product", "id=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.shared.products.find(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_product_is_not_found() {
        let h = harness("http://127.0.0.1:9");
        let (status, _) = send(
            h.router.clone(),
            form_request("/update_product", "id=5&name=x&like_count=0"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(h.router, form_request("/delete_product", "id=5")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let span = &h.sink.spans_for_operation("delete_product")[0];
        assert_eq!(span.tag("product_id"), Some(&Value::from(5)));
        assert_eq!(span.tag("error"), Some(&Value::from(true)));
    }

    #[tokio::test]
    async fn non_numeric_product_id_is_a_client_error() {
        let h = harness("http://127.0.0.1:9");
        let (status, _) = send(h.router, form_request("/delete_product", "id=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
