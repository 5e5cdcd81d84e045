//! Moderated message relay.
//!
//! A submission service queues incoming messages and forwards them to a
//! moderation service, which approves them, queues the approved form and
//! calls the submission service back. One trace follows each message across
//! both services.
//!
//! # Crates
//!
//! * `relay-protocol`: form payloads, queue names, route paths
//! * `relay-core`: configuration, errors, trace propagation, stores, peer client
//! * `relay-submission` / `relay-moderation`: the two services
//! * `relay-cli`: the `relay` operator command

use std::sync::Arc;

use anyhow::Context;
use relay_core::client::PeerClient;
use relay_core::queue::QueueStore;
use relay_core::server::{serve_listener, ServiceHandle};
use relay_core::trace::SpanSink;
use tokio::net::TcpListener;
use tracing::info;

pub use relay_core::{RelayError, RequestSpan, SharedClients, Span, SpanContext, Tracer};
pub use relay_moderation::{ModerationApiBuilder, ModerationContext, ModerationServiceConfig};
pub use relay_protocol::prelude;
pub use relay_submission::{SubmissionApiBuilder, SubmissionContext, SubmissionServiceConfig};

/// Both services running in-process on ephemeral loopback ports, sharing one
/// in-memory queue store and catalog.
pub struct LocalRelay {
    pub submission: ServiceHandle,
    pub moderation: ServiceHandle,
    pub shared: SharedClients,
}

impl LocalRelay {
    /// Starts both services; every finished span goes to `sink`.
    pub async fn start(sink: Arc<dyn SpanSink>) -> anyhow::Result<Self> {
        let submission_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind submission listener")?;
        let moderation_listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind moderation listener")?;
        let submission_url = format!("http://{}", submission_listener.local_addr()?);
        let moderation_url = format!("http://{}", moderation_listener.local_addr()?);

        let shared = SharedClients::in_memory("submission", sink.clone());
        let submission_context = SubmissionContext::new(
            shared.clone(),
            PeerClient::new("moderation", &moderation_url, None)?,
        );
        let moderation_context = ModerationContext::new(
            shared.for_service("moderation", sink),
            PeerClient::new("submission", &submission_url, None)?,
        );

        let submission = serve_listener(
            "submission",
            submission_listener,
            SubmissionApiBuilder::new(submission_context).into_router(),
        )?;
        let moderation = serve_listener(
            "moderation",
            moderation_listener,
            ModerationApiBuilder::new(moderation_context).into_router(),
        )?;
        info!(%submission_url, %moderation_url, "local relay started");

        Ok(Self {
            submission,
            moderation,
            shared,
        })
    }

    pub fn submission_url(&self) -> String {
        format!("http://{}", self.submission.addr)
    }

    pub fn moderation_url(&self) -> String {
        format!("http://{}", self.moderation.addr)
    }

    pub fn queues(&self) -> &Arc<dyn QueueStore> {
        &self.shared.queues
    }

    pub async fn stop(self) {
        self.submission.stop().await;
        self.moderation.stop().await;
    }
}
