//! Core shared library for the relay services.
//!
//! This crate exposes the primitives both services are built from:
//! configuration loading, the canonical error type and its HTTP rendering,
//! logging setup, the trace context propagator and its request middleware,
//! the queue store, the product catalog repository and the peer HTTP client.

pub mod app_error;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod errors;
pub mod logging;
pub mod middleware;
pub mod catalog;
pub mod queue;
pub mod server;
pub mod trace;

pub use app_error::{AppError, AppResult};
pub use context::SharedClients;
pub use errors::{RelayError, Result as CoreResult};
pub use middleware::RequestSpan;
pub use trace::{Carrier, Span, SpanContext, Tracer};
