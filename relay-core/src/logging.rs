use std::env;
use std::io;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::errors::{RelayError, Result};

const DEFAULT_FILTER: &str = "info";

/// Installs the process-wide subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Events go to stderr, leaving stdout to command output.
pub fn init_tracing(default_filter: Option<&str>) -> Result<()> {
    let filter = log_filter(env::var("RUST_LOG").ok().as_deref(), default_filter)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_ansi(atty::is(atty::Stream::Stderr)),
        )
        .try_init()
        .map_err(|err| RelayError::GeneralError(format!("tracing already initialised: {err}")))
}

fn log_filter(from_env: Option<&str>, default_filter: Option<&str>) -> Result<EnvFilter> {
    let directives = from_env
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .unwrap_or_else(|| default_filter.unwrap_or(DEFAULT_FILTER));

    EnvFilter::try_new(directives).map_err(|err| {
        RelayError::ConfigError(format!("invalid log filter '{directives}': {err}"))
    })
}
