//! Submission service.
//!
//! Accepts messages from submitters, records them on the pending queue and
//! forwards each one synchronously to the moderation service, returning its
//! answer. Also receives the approval callback and serves the product
//! listing.

mod config;
mod handlers;

use std::time::Duration;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use relay_core::client::PeerClient;
use relay_core::middleware::instrument;
use relay_core::SharedClients;
use relay_protocol::routes;

pub use config::{SubmissionServiceConfig, SUBMISSION_DEFAULTS};
pub use relay_core::{AppError, AppResult};

/// Everything a submission handler needs, built once at startup.
#[derive(Clone)]
pub struct SubmissionContext {
    pub shared: SharedClients,
    pub moderation: PeerClient,
}

impl SubmissionContext {
    pub fn new(shared: SharedClients, moderation: PeerClient) -> Self {
        Self { shared, moderation }
    }
}

/// Composes the submission router around a [`SubmissionContext`].
#[derive(Clone)]
pub struct SubmissionApiBuilder {
    context: SubmissionContext,
}

impl SubmissionApiBuilder {
    pub fn new(context: SubmissionContext) -> Self {
        Self { context }
    }

    /// Connects the stores and the moderation client described by `config`.
    pub async fn from_config(config: &SubmissionServiceConfig) -> anyhow::Result<Self> {
        let shared = SharedClients::connect(&config.core)
            .await
            .context("failed to initialise submission stores")?;
        let moderation = moderation_client(&config.peer_url, config.core.peer_timeout)?;
        Ok(Self::new(SubmissionContext::new(shared, moderation)))
    }

    pub fn context(&self) -> &SubmissionContext {
        &self.context
    }

    pub fn into_router(self) -> Router {
        let tracer = self.context.shared.tracer.clone();
        let router = Router::new()
            .route(routes::INDEX, get(handlers::index))
            .route(routes::SEND_MESSAGE, post(handlers::send_message))
            .route(routes::MESSAGE_APPROVED, post(handlers::message_approved))
            .route(routes::LIKE_PRODUCT, post(handlers::like_product))
            .route(routes::HEALTH, get(handlers::health))
            .with_state(self.context);
        instrument(router, tracer)
    }
}

fn moderation_client(url: &str, timeout: Option<Duration>) -> anyhow::Result<PeerClient> {
    PeerClient::new("moderation", url, timeout).context("invalid moderation service url")
}
