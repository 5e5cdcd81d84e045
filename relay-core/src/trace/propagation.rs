use std::collections::HashMap;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, Injector, TextMapPropagator};
use opentelemetry::trace::{SpanContext, TraceContextExt};
use opentelemetry::Context;
use opentelemetry_jaeger_propagator::Propagator as JaegerPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;

/// Serialized span identity carried in outbound request headers.
pub type Carrier = HashMap<String, String>;

/// W3C Trace Context header.
pub const TRACEPARENT_HEADER: &str = "traceparent";
/// Jaeger native propagation header, accepted on extraction only.
pub const UBER_TRACE_ID_HEADER: &str = "uber-trace-id";

/// Read-only view of inbound HTTP headers as a propagation carrier.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Writes W3C trace context headers for `context`. Invalid contexts write
/// nothing.
pub fn inject_context(context: &SpanContext, injector: &mut dyn Injector) {
    let cx = Context::new().with_remote_span_context(context.clone());
    TraceContextPropagator::new().inject_context(&cx, injector);
}

/// Reads a span context from the carrier: `traceparent` first, then
/// `uber-trace-id`. Missing or malformed entries yield `None`; callers start
/// a new root trace in that case.
pub fn extract_context(extractor: &dyn Extractor) -> Option<SpanContext> {
    let w3c = remote_context(&TraceContextPropagator::new(), extractor);
    w3c.or_else(|| remote_context(&JaegerPropagator::new(), extractor))
}

fn remote_context(
    propagator: &dyn TextMapPropagator,
    extractor: &dyn Extractor,
) -> Option<SpanContext> {
    let cx = propagator.extract_with_context(&Context::new(), extractor);
    let span_context = cx.span().span_context().clone();
    span_context.is_valid().then_some(span_context)
}
