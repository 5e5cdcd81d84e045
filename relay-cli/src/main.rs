use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use relay_core::client::PeerClient;
use relay_core::config::CoreConfig;
use relay_core::logging;
use relay_core::trace::Tracer;
use relay_protocol::message::QueueName;

mod commands;
mod output;

use commands::{execute, Clients};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Operate the relay submission and moderation services", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "SUBMISSION_URL",
        default_value = "http://127.0.0.1:5001"
    )]
    submission_url: String,
    #[arg(
        long,
        global = true,
        env = "MODERATION_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    moderation_url: String,
    /// Give up on a service call after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Submit a message through the submission service
    Submit {
        message: String,
    },
    /// Send a message straight to moderation for approval
    Approve {
        message: String,
    },
    /// Show the pending queue as seen by the moderation service
    Pending,
    /// Read a queue directly from Redis
    Queue {
        /// `pending` or `approved`
        queue: QueueName,
    },
    /// List the product catalog
    Products,
    /// Like a product
    Like {
        product_id: i32,
    },
    /// Manage catalog entries through the moderation service
    #[command(subcommand)]
    Product(ProductCommands),
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProductCommands {
    /// Add a new product
    Add(ProductArgs),
    /// Replace an existing product
    Update(ProductArgs),
    /// Delete a product
    Delete {
        id: i32,
    },
}

#[derive(Args, Debug)]
pub(crate) struct ProductArgs {
    id: i32,
    #[arg(long)]
    name: String,
    #[arg(long, default_value_t = 0)]
    like_count: i32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = logging::init_tracing(Some("warn")) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let cli = Cli::parse();
    let config = CoreConfig::from_env("relay-cli").context("failed to load configuration")?;
    let clients = build_clients(&cli, &config)?;

    let outcome = execute(cli.command, &clients).await;
    clients.tracer.flush();
    output::render(&outcome?);
    Ok(())
}

/// Peer clients plus a tracer exporting the same way the services do.
fn build_clients(cli: &Cli, config: &CoreConfig) -> anyhow::Result<Clients> {
    let timeout = cli
        .timeout_ms
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis)
        .or(config.peer_timeout);

    Ok(Clients {
        tracer: Tracer::from_config(config).context("failed to set up span export")?,
        submission: PeerClient::new("submission", &cli.submission_url, timeout)?,
        moderation: PeerClient::new("moderation", &cli.moderation_url, timeout)?,
        redis_url: config.redis_url.clone(),
    })
}
