use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::trace::{Carrier, SpanContext, Tracer};

/// Typed HTTP client for calls between relay services.
///
/// Every call attaches the trace carrier as request headers. No retries are
/// performed; a timeout applies only when one was configured.
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    base_url: Url,
    peer: &'static str,
}

impl PeerClient {
    /// Creates a new client bound to the provided base URL.
    pub fn new(
        peer: &'static str,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, PeerClientError> {
        let mut url = Url::parse(base_url).map_err(|err| PeerClientError::InvalidUrl {
            url: base_url.to_string(),
            source: err,
        })?;

        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_string();
            path.push('/');
            url.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|err| PeerClientError::Http {
                peer,
                message: err.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: url,
            peer,
        })
    }

    /// Name of the service this client talks to.
    pub fn peer(&self) -> &'static str {
        self.peer
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a form-encoded `POST` and returns the response body text.
    pub async fn post_form<T>(
        &self,
        path: &str,
        form: &T,
        carrier: &Carrier,
    ) -> Result<String, PeerClientError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let mut request = self.http.post(url).form(form);
        for (name, value) in carrier {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|err| self.http_error(err))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| PeerClientError::Decode(err.to_string()))?;

        if !status.is_success() {
            return Err(PeerClientError::UnexpectedStatus {
                peer: self.peer,
                status,
                body,
            });
        }

        Ok(body)
    }

    /// Posts `form` under a new client span named `operation`, child of
    /// `parent` (a new root when `None`). The span's identity travels in the
    /// request headers; the outcome is logged on the span before it finishes.
    pub async fn post_form_traced<T>(
        &self,
        tracer: &Tracer,
        parent: Option<&SpanContext>,
        operation: &str,
        path: &str,
        form: &T,
    ) -> Result<String, PeerClientError>
    where
        T: Serialize + ?Sized,
    {
        let mut span = tracer.start_span(operation, parent);
        span.set_tag("span.kind", "client");
        span.set_tag("peer.service", self.peer);
        span.set_tag("http.method", "POST");
        span.set_tag("http.url", path);

        let carrier = tracer.inject(&span);
        let result = self.post_form(path, form, &carrier).await;
        match &result {
            Ok(body) => {
                debug!(peer = self.peer, path, "peer call succeeded");
                span.log_kv([
                    ("event", json!(format!("{} request/response", self.peer))),
                    ("response", json!(body)),
                ]);
            }
            Err(err) => {
                warn!(peer = self.peer, path, %err, "peer call failed");
                span.set_tag("error", true);
                span.log_kv([("event", json!("error")), ("message", json!(err.to_string()))]);
            }
        }
        span.finish();

        result
    }

    /// Sends a `GET` and decodes the JSON response.
    pub async fn get_json<T>(&self, path: &str, carrier: &Carrier) -> Result<T, PeerClientError>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut request = self.http.get(url);
        for (name, value) in carrier {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|err| self.http_error(err))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PeerClientError::UnexpectedStatus {
                peer: self.peer,
                status,
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|err| PeerClientError::Decode(err.to_string()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, PeerClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| PeerClientError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                source: err,
            })
    }

    fn http_error(&self, err: reqwest::Error) -> PeerClientError {
        if err.is_timeout() {
            PeerClientError::Timeout { peer: self.peer }
        } else {
            PeerClientError::Http {
                peer: self.peer,
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum PeerClientError {
    #[error("invalid peer url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{peer} request failed: {message}")]
    Http { peer: &'static str, message: String },
    #[error("{peer} did not answer in time")]
    Timeout { peer: &'static str },
    #[error("{peer} returned unexpected status {status}: {body}")]
    UnexpectedStatus {
        peer: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode peer response: {0}")]
    Decode(String),
}
