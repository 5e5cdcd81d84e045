use anyhow::Context;
use relay_core::config::ServiceConfig;
use relay_core::{logging, server};
use relay_moderation::{ModerationApiBuilder, MODERATION_DEFAULTS};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = logging::init_tracing(None) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let config = ServiceConfig::from_env(&MODERATION_DEFAULTS)
        .context("failed to load moderation configuration")?;
    info!(submission = %config.peer_url, "approval callbacks go to submission");

    let builder = ModerationApiBuilder::from_config(&config).await?;
    let tracer = builder.context().shared.tracer.clone();
    let router = builder.into_router();
    server::run_until_shutdown("moderation", &config.bind_address, router, &tracer).await
}
