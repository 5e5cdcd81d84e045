use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::SystemTime;

use opentelemetry::trace::{
    Event, Span as _, SpanBuilder, SpanContext, SpanId, SpanKind, Status, TraceContextExt,
    TraceFlags, TraceId, TraceState, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{Tracer as SdkTracer, TracerProvider as SdkTracerProvider};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, warn};

use super::span::{LogRecord, SpanRecord};
use crate::errors::{RelayError, Result};

/// Destination for finished spans. Exporting is fire-and-forget: a sink
/// must never block the request or report failures back to it.
pub trait SpanSink: Send + Sync {
    fn export(&self, span: SpanRecord);

    /// Pushes out anything still buffered.
    fn flush(&self) {}
}

/// Emits finished spans as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl SpanSink for LogSink {
    fn export(&self, span: SpanRecord) {
        info!(
            target: "relay::spans",
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            parent_span_id = ?span.parent_span_id,
            service = %span.service,
            operation = %span.operation_name,
            duration_ms = span.duration_ms,
            tags = %serde_json::Value::from(serde_json::Map::from_iter(span.tags.clone())),
            logs = span.logs.len(),
            "span finished"
        );
    }
}

/// Replays finished spans through an OpenTelemetry tracer exporting to a
/// Jaeger agent over UDP.
///
/// Span and trace ids are kept as recorded, so the exported trace lines up
/// with the ids carried in request headers.
#[derive(Clone)]
pub struct CollectorSink {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    endpoint: String,
}

impl CollectorSink {
    /// `endpoint` is the agent's `host:port`.
    pub fn jaeger(service_name: &str, endpoint: &str) -> Result<Self> {
        endpoint.to_socket_addrs().map_err(|err| {
            RelayError::ConfigError(format!("invalid Jaeger agent endpoint {endpoint}: {err}"))
        })?;

        let provider = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(service_name)
            .with_endpoint(endpoint)
            .build_simple()
            .map_err(|err| {
                RelayError::ConfigError(format!("cannot export spans to {endpoint}: {err}"))
            })?;
        let tracer = provider.tracer("relay");

        Ok(Self {
            provider,
            tracer,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpanSink for CollectorSink {
    fn export(&self, span: SpanRecord) {
        let (Ok(trace_id), Ok(span_id)) =
            (TraceId::from_hex(&span.trace_id), SpanId::from_hex(&span.span_id))
        else {
            warn!(operation = %span.operation_name, "span ids are not hex; dropping span");
            return;
        };

        let parent = match span.parent_span_id.as_deref().map(SpanId::from_hex) {
            Some(Ok(parent_id)) => Context::new().with_remote_span_context(SpanContext::new(
                trace_id,
                parent_id,
                TraceFlags::SAMPLED,
                true,
                TraceState::default(),
            )),
            _ => Context::new(),
        };

        let failed = span.tag("error").and_then(Value::as_bool).unwrap_or(false);
        let builder = SpanBuilder::from_name(span.operation_name.clone())
            .with_trace_id(trace_id)
            .with_span_id(span_id)
            .with_kind(span_kind(span.tag("span.kind")))
            .with_start_time(SystemTime::from(span.start_time))
            .with_attributes(
                span.tags
                    .iter()
                    .map(|(key, value)| attribute(key, value))
                    .collect::<Vec<_>>(),
            )
            .with_events(span.logs.iter().map(event).collect());

        let mut exported = self.tracer.build_with_context(builder, &parent);
        if failed {
            exported.set_status(Status::error("request failed"));
        }
        exported.end_with_timestamp(SystemTime::from(span.end_time));
    }

    fn flush(&self) {
        for result in self.provider.force_flush() {
            if let Err(err) = result {
                warn!(%err, endpoint = %self.endpoint, "failed to flush spans");
            }
        }
    }
}

fn span_kind(tag: Option<&Value>) -> SpanKind {
    match tag.and_then(Value::as_str) {
        Some("server") => SpanKind::Server,
        Some("client") => SpanKind::Client,
        _ => SpanKind::Internal,
    }
}

fn attribute(key: &str, value: &Value) -> KeyValue {
    let key = key.to_string();
    match value {
        Value::Bool(flag) => KeyValue::new(key, *flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => KeyValue::new(key, int),
            None => KeyValue::new(key, number.as_f64().unwrap_or_default()),
        },
        Value::String(text) => KeyValue::new(key, text.clone()),
        other => KeyValue::new(key, other.to_string()),
    }
}

fn event(log: &LogRecord) -> Event {
    let name = log
        .fields
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("log")
        .to_string();
    let attributes = log
        .fields
        .iter()
        .filter(|(key, _)| key.as_str() != "event")
        .map(|(key, value)| attribute(key, value))
        .collect();
    Event::new(name, SystemTime::from(log.timestamp), attributes, 0)
}

/// Keeps finished spans in memory. Used by tests and local tooling.
#[derive(Clone, Default)]
pub struct MemorySink {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().clone()
    }

    pub fn spans_for_operation(&self, operation: &str) -> Vec<SpanRecord> {
        self.spans
            .lock()
            .iter()
            .filter(|span| span.operation_name == operation)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.lock().is_empty()
    }

    pub fn clear(&self) {
        self.spans.lock().clear();
    }
}

impl SpanSink for MemorySink {
    fn export(&self, span: SpanRecord) {
        self.spans.lock().push(span);
    }
}
