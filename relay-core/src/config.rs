use std::env;
use std::time::Duration;

use url::Url;

use crate::errors::{ConfigError, RelayError};

/// Configuration shared by every relay service.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub service_name: String,
    pub redis_url: String,
    pub database_url: Option<String>,
    pub http_bind: Option<String>,
    /// Jaeger agent `host:port` finished spans are exported to.
    pub trace_collector_url: Option<String>,
    pub trace_sampled: bool,
    pub peer_timeout: Option<Duration>,
}

impl CoreConfig {
    /// Loads configuration from the process environment.
    pub fn from_env(service_name: &str) -> Result<Self, ConfigError> {
        Self::from_env_with_prefix("", service_name)
    }

    /// Loads configuration from env vars, preferring keys prefixed with the
    /// provided value (e.g. `MODERATION_REDIS_URL` over `REDIS_URL`).
    pub fn from_env_with_prefix(prefix: &str, service_name: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(prefix, service_name, |key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_source<F>(prefix: &str, service_name: &str, source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = prefixed_lookup(prefix, &source);

        let redis_url = match lookup("REDIS_URL") {
            Some(url) => url,
            None => {
                let host = lookup("REDIS_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = lookup("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
                format!("redis://{host}:{port}")
            }
        };
        validate_url("REDIS_URL", &redis_url, &["redis", "rediss"])?;

        let database_url = match lookup("DATABASE_URL") {
            Some(url) => Some(url),
            None => match lookup("DB_HOST") {
                Some(host) => Some(compose_database_url(
                    &host,
                    &lookup("DB_PORT").unwrap_or_else(|| "5432".to_string()),
                    &lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                    &lookup("DB_PASSWORD").unwrap_or_default(),
                    &lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                )?),
                None => None,
            },
        };

        let service_name = lookup("SERVICE_NAME").unwrap_or_else(|| service_name.to_string());
        let http_bind = lookup("HTTP_BIND");

        let trace_collector_url = lookup("TRACE_COLLECTOR_URL")
            .map(|raw| parse_agent_endpoint("TRACE_COLLECTOR_URL", &raw))
            .transpose()?;

        let trace_sampled = match lookup("TRACE_SAMPLED") {
            Some(raw) => parse_flag("TRACE_SAMPLED", &raw)?,
            None => true,
        };

        let peer_timeout = match lookup("PEER_TIMEOUT_MS") {
            Some(raw) => parse_timeout("PEER_TIMEOUT_MS", &raw)?,
            None => None,
        };

        Ok(Self {
            service_name,
            redis_url,
            database_url,
            http_bind,
            trace_collector_url,
            trace_sampled,
            peer_timeout,
        })
    }

    /// Returns the Postgres URL, if the catalog is backed by a database.
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref()
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }
}

/// Fixed facts about one relay service: its name, env prefix, default bind
/// address and the peer it calls.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDefaults {
    pub service_name: &'static str,
    pub env_prefix: &'static str,
    pub bind_address: &'static str,
    pub peer_url_key: &'static str,
    pub peer_url: &'static str,
}

/// Runtime configuration of one relay service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub bind_address: String,
    /// Base URL of the peer service, without a trailing slash.
    pub peer_url: String,
}

impl ServiceConfig {
    /// Reads prefixed keys first, then the shared ones.
    pub fn from_env(defaults: &ServiceDefaults) -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Ok(Self::from_source(defaults, |key| env::var(key).ok())?)
    }

    pub fn from_source<F>(defaults: &ServiceDefaults, source: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let core = CoreConfig::from_source(defaults.env_prefix, defaults.service_name, &source)?;
        let bind_address = core
            .http_bind
            .clone()
            .unwrap_or_else(|| defaults.bind_address.to_string());

        let lookup = prefixed_lookup(defaults.env_prefix, &source);
        let peer_url = lookup(defaults.peer_url_key)
            .unwrap_or_else(|| defaults.peer_url.to_string());
        let peer_url = sanitize_http_url(defaults.peer_url_key, &peer_url)?;

        Ok(Self {
            core,
            bind_address,
            peer_url,
        })
    }
}

fn prefixed_lookup<'a, F>(prefix: &'a str, source: &'a F) -> impl Fn(&str) -> Option<String> + 'a
where
    F: Fn(&str) -> Option<String> + 'a,
{
    move |suffix: &str| {
        let prefixed = format!("{prefix}{suffix}");
        source(&prefixed)
            .or_else(|| source(suffix))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

fn sanitize_http_url(key: &str, value: &str) -> Result<String, ConfigError> {
    validate_url(key, value, &["http", "https"])?;
    Ok(value.trim_end_matches('/').to_string())
}

fn validate_url(key: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let parsed = Url::parse(value).map_err(|err| invalid(key, err))?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(invalid(
            key,
            format!("scheme must be one of {}", schemes.join(", ")),
        ));
    }

    Ok(())
}

/// Accepts `host:port` or `udp://host:port`.
fn parse_agent_endpoint(key: &str, raw: &str) -> Result<String, ConfigError> {
    let endpoint = raw.strip_prefix("udp://").unwrap_or(raw).trim_end_matches('/');
    match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(endpoint.to_string())
        }
        _ => Err(invalid(key, "expected a Jaeger agent host:port")),
    }
}

/// `0` disables the timeout, same as leaving the key unset.
fn parse_timeout(key: &str, raw: &str) -> Result<Option<Duration>, ConfigError> {
    let millis = raw.parse::<u64>().map_err(|err| invalid(key, err))?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
    }
}

fn compose_database_url(
    host: &str,
    port: &str,
    user: &str,
    password: &str,
    name: &str,
) -> Result<String, ConfigError> {
    let port = port.parse::<u16>().map_err(|err| invalid("DB_PORT", err))?;

    let mut url = Url::parse("postgres://localhost").map_err(|err| invalid("DB_HOST", err))?;
    url.set_host(Some(host)).map_err(|err| invalid("DB_HOST", err))?;
    url.set_port(Some(port))
        .map_err(|_| invalid("DB_PORT", "cannot carry a port"))?;
    url.set_username(user)
        .map_err(|_| invalid("DB_USER", "cannot carry a user name"))?;
    if !password.is_empty() {
        url.set_password(Some(password))
            .map_err(|_| invalid("DB_PASSWORD", "cannot carry a password"))?;
    }
    url.set_path(name);

    Ok(url.to_string())
}

fn invalid(key: &str, message: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
