use std::fmt;
use std::sync::Arc;

use opentelemetry::propagation::Extractor;
use opentelemetry::trace::{SpanContext, TraceFlags, TraceState};
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator};

use super::propagation::{extract_context, inject_context, Carrier};
use super::sink::{CollectorSink, LogSink, SpanSink};
use super::span::Span;
use crate::config::CoreConfig;
use crate::errors::Result;

/// Creates spans for one service and moves their identity across calls.
///
/// Cheap to clone; constructed once at startup and handed to whatever needs
/// it.
#[derive(Clone)]
pub struct Tracer {
    service: Arc<str>,
    sink: Arc<dyn SpanSink>,
    sampled: bool,
    ids: RandomIdGenerator,
}

impl Tracer {
    pub fn new(service: impl Into<String>, sink: Arc<dyn SpanSink>) -> Self {
        Self {
            service: Arc::from(service.into()),
            sink,
            sampled: true,
            ids: RandomIdGenerator::default(),
        }
    }

    /// Builds the tracer described by the configuration: spans go to the
    /// Jaeger agent when `TRACE_COLLECTOR_URL` is set, to the log otherwise.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        let sink: Arc<dyn SpanSink> = match &config.trace_collector_url {
            Some(endpoint) => Arc::new(CollectorSink::jaeger(&config.service_name, endpoint)?),
            None => Arc::new(LogSink),
        };
        Ok(Self::new(config.service_name.clone(), sink).with_sampling(config.trace_sampled))
    }

    /// Sampling decision applied to new root traces. Children always follow
    /// their parent's decision.
    pub fn with_sampling(mut self, sampled: bool) -> Self {
        self.sampled = sampled;
        self
    }

    /// Same sampling policy, spans attributed to `service` and sent to `sink`.
    pub fn with_service(&self, service: impl Into<String>, sink: Arc<dyn SpanSink>) -> Self {
        Self::new(service, sink).with_sampling(self.sampled)
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn samples_new_traces(&self) -> bool {
        self.sampled
    }

    /// Starts a root span when `parent` is `None`, a child of `parent` otherwise.
    pub fn start_span(&self, operation_name: &str, parent: Option<&SpanContext>) -> Span {
        let (trace_id, flags, parent_span_id) = match parent {
            Some(parent) => (parent.trace_id(), parent.trace_flags(), Some(parent.span_id())),
            None => {
                let flags = if self.sampled {
                    TraceFlags::SAMPLED
                } else {
                    TraceFlags::default()
                };
                (self.ids.new_trace_id(), flags, None)
            }
        };
        let context = SpanContext::new(
            trace_id,
            self.ids.new_span_id(),
            flags,
            false,
            TraceState::default(),
        );

        Span::start(
            operation_name,
            self.service.clone(),
            context,
            parent_span_id,
            self.sink.clone(),
        )
    }

    /// Serializes the span's identity into a fresh carrier.
    pub fn inject(&self, span: &Span) -> Carrier {
        let mut carrier = Carrier::new();
        inject_context(&span.context(), &mut carrier);
        carrier
    }

    /// Reads a parent context from an inbound carrier, if a usable one is present.
    pub fn extract<E: Extractor>(&self, carrier: &E) -> Option<SpanContext> {
        extract_context(carrier)
    }

    pub fn finish(&self, span: Span) {
        span.finish();
    }

    /// Flushes the sink; call before the process exits.
    pub fn flush(&self) {
        self.sink.flush();
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("service", &self.service)
            .field("sampled", &self.sampled)
            .finish()
    }
}
