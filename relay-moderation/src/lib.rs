//! Moderation service.
//!
//! Approves every forwarded message, records it on the approved queue and
//! notifies the submission service. Also exposes the pending queue snapshot
//! and the product catalog administration endpoints.

mod config;
mod handlers;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use relay_core::client::PeerClient;
use relay_core::middleware::instrument;
use relay_core::SharedClients;
use relay_protocol::routes;

pub use config::{ModerationServiceConfig, MODERATION_DEFAULTS};
pub use relay_core::{AppError, AppResult};

#[derive(Clone)]
pub struct ModerationContext {
    pub shared: SharedClients,
    pub submission: PeerClient,
}

impl ModerationContext {
    pub fn new(shared: SharedClients, submission: PeerClient) -> Self {
        Self { shared, submission }
    }
}

#[derive(Clone)]
pub struct ModerationApiBuilder {
    context: ModerationContext,
}

impl ModerationApiBuilder {
    pub fn new(context: ModerationContext) -> Self {
        Self { context }
    }

    pub async fn from_config(config: &ModerationServiceConfig) -> anyhow::Result<Self> {
        let shared = SharedClients::connect(&config.core)
            .await
            .context("failed to initialise moderation stores")?;
        let submission =
            PeerClient::new("submission", &config.peer_url, config.core.peer_timeout)
                .context("invalid submission service url")?;
        Ok(Self::new(ModerationContext::new(shared, submission)))
    }

    pub fn context(&self) -> &ModerationContext {
        &self.context
    }

    pub fn into_router(self) -> Router {
        let tracer = self.context.shared.tracer.clone();
        let router = Router::new()
            .route(routes::INDEX, get(handlers::index))
            .route(routes::APPROVE_MESSAGE, post(handlers::approve_message))
            .route(routes::ADD_PRODUCT, post(handlers::add_product))
            .route(routes::UPDATE_PRODUCT, post(handlers::update_product))
            .route(routes::DELETE_PRODUCT, post(handlers::delete_product))
            .route(routes::HEALTH, get(handlers::health))
            .with_state(self.context);
        instrument(router, tracer)
    }
}
