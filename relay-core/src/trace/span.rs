use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use opentelemetry::trace::{SpanContext, SpanId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::sink::SpanSink;

/// Timestamped set of key/value fields attached to a span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<String, Value>,
}

/// Finished span as delivered to a sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanRecord {
    pub trace_id: String,
    pub span_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub service: String,
    pub operation_name: String,
    pub sampled: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, Value>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

impl SpanRecord {
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    /// Whether any log entry carries `event = <event>`.
    pub fn has_event(&self, event: &str) -> bool {
        self.logs
            .iter()
            .any(|log| log.fields.get("event").and_then(Value::as_str) == Some(event))
    }
}

/// One unit of work inside one service process.
///
/// A span is finished exactly once: either explicitly through
/// [`Span::finish`], or when it is dropped, which covers early returns and
/// unwinding.
pub struct Span {
    context: SpanContext,
    parent_span_id: Option<SpanId>,
    operation_name: String,
    service: Arc<str>,
    start_time: DateTime<Utc>,
    tags: BTreeMap<String, Value>,
    logs: Vec<LogRecord>,
    sink: Arc<dyn SpanSink>,
    finished: bool,
}

impl Span {
    pub(crate) fn start(
        operation_name: &str,
        service: Arc<str>,
        context: SpanContext,
        parent_span_id: Option<SpanId>,
        sink: Arc<dyn SpanSink>,
    ) -> Self {
        Self {
            context,
            parent_span_id,
            operation_name: operation_name.to_string(),
            service,
            start_time: Utc::now(),
            tags: BTreeMap::new(),
            logs: Vec::new(),
            sink,
            finished: false,
        }
    }

    pub fn context(&self) -> SpanContext {
        self.context.clone()
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags.get(key)
    }

    pub fn logs(&self) -> &[LogRecord] {
        &self.logs
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn log_kv<I, K>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        self.logs.push(LogRecord {
            timestamp: Utc::now(),
            fields,
        });
    }

    /// Shorthand for a log entry holding only `event`.
    pub fn log_event(&mut self, event: &str) {
        self.log_kv([("event", Value::from(event))]);
    }

    /// Fixes the end timestamp and hands the span to the sink.
    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let end_time = Utc::now();
        let record = SpanRecord {
            trace_id: self.context.trace_id().to_string(),
            span_id: self.context.span_id().to_string(),
            parent_span_id: self.parent_span_id.map(|id| id.to_string()),
            service: self.service.to_string(),
            operation_name: std::mem::take(&mut self.operation_name),
            sampled: self.context.is_sampled(),
            start_time: self.start_time,
            end_time,
            duration_ms: (end_time - self.start_time).num_milliseconds().max(0),
            tags: std::mem::take(&mut self.tags),
            logs: std::mem::take(&mut self.logs),
        };

        if record.sampled {
            self.sink.export(record);
        }
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("operation_name", &self.operation_name)
            .field("service", &self.service)
            .field("context", &self.context)
            .field("parent_span_id", &self.parent_span_id)
            .field("finished", &self.finished)
            .finish()
    }
}
