use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::trace::{HeaderExtractor, Span, SpanContext, Tracer};

/// Request-scoped span, reachable from handlers through
/// `Extension<RequestSpan>`.
///
/// The span is owned by the middleware that created it; handlers only log
/// and tag through this handle. Once the middleware finishes the span,
/// further calls are ignored.
#[derive(Clone)]
pub struct RequestSpan {
    inner: Arc<Mutex<Option<Span>>>,
}

impl RequestSpan {
    fn new(span: Span) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(span))),
        }
    }

    /// Context to use as parent for outbound spans.
    pub fn context(&self) -> Option<SpanContext> {
        self.inner.lock().as_ref().map(Span::context)
    }

    pub fn set_tag(&self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(span) = self.inner.lock().as_mut() {
            span.set_tag(key, value);
        }
    }

    pub fn log_kv<I, K>(&self, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        if let Some(span) = self.inner.lock().as_mut() {
            span.log_kv(fields);
        }
    }

    pub fn log_event(&self, event: &str) {
        if let Some(span) = self.inner.lock().as_mut() {
            span.log_event(event);
        }
    }

    /// Tags the span as failed and logs `message` as an error event.
    pub fn record_error(&self, message: &str) {
        if let Some(span) = self.inner.lock().as_mut() {
            span.set_tag("error", true);
            span.log_kv([
                ("event", Value::from("error")),
                ("message", Value::from(message)),
            ]);
        }
    }

    fn finish(&self) {
        let span = self.inner.lock().take();
        if let Some(span) = span {
            span.finish();
        }
    }
}

/// Finishes the request span when dropped, so a panicking or cancelled
/// handler still closes it.
struct FinishGuard {
    span: RequestSpan,
    completed: bool,
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if !self.completed {
            self.span.set_tag("error", true);
            self.span.log_event("request aborted");
            warn!("request handler did not complete; closing its span");
        }
        self.span.finish();
    }
}

/// Opens a span for every inbound request: parent extracted from the
/// request headers (root trace when absent or malformed), operation named
/// after the matched route. The span is finished exactly once after the
/// handler completes.
pub async fn trace_request(
    State(tracer): State<Tracer>,
    mut request: Request,
    next: Next,
) -> Response {
    let operation = operation_name(&request);
    let parent = tracer.extract(&HeaderExtractor(request.headers()));

    let mut span = tracer.start_span(&operation, parent.as_ref());
    span.set_tag("span.kind", "server");
    span.set_tag("http.method", request.method().as_str());
    span.set_tag("http.url", request.uri().path());

    let handle = RequestSpan::new(span);
    request.extensions_mut().insert(handle.clone());
    let mut guard = FinishGuard {
        span: handle.clone(),
        completed: false,
    };

    let response = next.run(request).await;

    let status = response.status();
    handle.set_tag("http.status_code", status.as_u16());
    if status.is_server_error() {
        handle.set_tag("error", true);
    }
    guard.completed = true;
    drop(guard);

    response
}

/// Wraps every route of `router` with the span middleware, panic recovery
/// and HTTP request logging.
pub fn instrument(router: Router, tracer: Tracer) -> Router {
    router
        .layer(middleware::from_fn_with_state(tracer, trace_request))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn operation_name(request: &Request) -> String {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "index".to_string()
    } else {
        trimmed.replace('/', ".")
    }
}
