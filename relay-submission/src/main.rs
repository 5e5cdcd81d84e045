use anyhow::Context;
use relay_core::config::ServiceConfig;
use relay_core::{logging, server};
use relay_submission::{SubmissionApiBuilder, SUBMISSION_DEFAULTS};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = logging::init_tracing(None) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let config = ServiceConfig::from_env(&SUBMISSION_DEFAULTS)
        .context("failed to load submission configuration")?;
    info!(moderation = %config.peer_url, "forwarding submissions to moderation");

    let builder = SubmissionApiBuilder::from_config(&config).await?;
    let tracer = builder.context().shared.tracer.clone();
    let router = builder.into_router();
    server::run_until_shutdown("submission", &config.bind_address, router, &tracer).await
}
