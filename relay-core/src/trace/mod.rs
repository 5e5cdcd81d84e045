//! Trace context propagation.
//!
//! A [`Span`] records one unit of work inside one service process. Spans are
//! correlated across direct service calls by injecting their [`SpanContext`]
//! into a [`Carrier`] (HTTP headers, W3C `traceparent`) on the way out and
//! extracting it on the way in. Ids, header formats and Jaeger export come
//! from OpenTelemetry. Finished spans are handed to a [`SpanSink`].
//!
//! ```ignore
//! let parent = tracer.extract(&HeaderExtractor(request.headers()));
//! let span = tracer.start_span("approve_message", parent.as_ref());
//! let carrier = tracer.inject(&span);
//! // ... attach `carrier` to the outbound request ...
//! tracer.finish(span);
//! ```

mod propagation;
mod sink;
mod span;
mod tracer;

pub use opentelemetry::trace::{SpanContext, SpanId, TraceId};
pub use propagation::{
    extract_context, inject_context, Carrier, HeaderExtractor, TRACEPARENT_HEADER,
    UBER_TRACE_ID_HEADER,
};
pub use sink::{CollectorSink, LogSink, MemorySink, SpanSink};
pub use span::{LogRecord, Span, SpanRecord};
pub use tracer::Tracer;
