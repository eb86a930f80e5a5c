//! HTTP client for `GET {api}/anomalies`.
//!
//! Requests are built deterministically from the viewport: parameters are
//! always written in the same order with six fractional digits, so identical
//! viewports produce byte-identical URLs. There is no retry; the next
//! debounced cycle is the retry.

use std::{future::Future, time::Duration, time::Instant};

use anomaly_core::{Anomaly, ViewportBounds};
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The server rejected the bounding box (`400`).
    Validation,
    /// The server could not reach its data store (`5xx`).
    UpstreamUnavailable,
    /// Transport failure or timeout before a response arrived.
    Network,
    /// The response body was not a Feature array.
    Decode,
}

impl FetchErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            FetchErrorKind::Validation => "validation",
            FetchErrorKind::UpstreamUnavailable => "upstream_unavailable",
            FetchErrorKind::Network => "network",
            FetchErrorKind::Decode => "decode",
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBase { url: String, reason: String },
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },
    #[error("failed to decode anomalies from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Status { status, .. } if (400..500).contains(status) => {
                FetchErrorKind::Validation
            }
            FetchError::Status { .. } => FetchErrorKind::UpstreamUnavailable,
            FetchError::Decode { .. } => FetchErrorKind::Decode,
            FetchError::InvalidBase { .. } | FetchError::Client(_) | FetchError::Network { .. } => {
                FetchErrorKind::Network
            }
        }
    }
}

/// Anything that can answer a bounding-box query for the session driver.
pub trait AnomalySource: Send + Sync + 'static {
    fn fetch(
        &self,
        bounds: ViewportBounds,
    ) -> impl Future<Output = Result<Vec<Anomaly>, FetchError>> + Send;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AnomalyFetchClient {
    client: Client,
    endpoint: Url,
}

impl AnomalyFetchClient {
    /// `api_base` is the API root, e.g. `http://localhost:3001/api`.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = format!("{}/anomalies", api_base.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint).map_err(|err| FetchError::InvalidBase {
            url: api_base.to_string(),
            reason: err.to_string(),
        })?;
        if endpoint.cannot_be_a_base() || !matches!(endpoint.scheme(), "http" | "https") {
            return Err(FetchError::InvalidBase {
                url: api_base.to_string(),
                reason: "expected an http(s) URL".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, endpoint })
    }

    /// Deterministic request URL for a viewport.
    pub fn request_url(&self, bounds: &ViewportBounds) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(bounds.query_pairs());
        url
    }

    async fn fetch_url(&self, url: Url) -> Result<Vec<Anomaly>, FetchError> {
        let url_text = url.to_string();
        debug!("Fetching anomalies from {url_text}");
        let network = |source| FetchError::Network {
            url: url_text.clone(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        let body = response.bytes().await.map_err(network)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_text.clone(),
                status: status.as_u16(),
                message: status_message(&body),
            });
        }

        serde_json::from_slice(&body).map_err(|source| FetchError::Decode {
            url: url_text.clone(),
            source,
        })
    }
}

impl AnomalySource for AnomalyFetchClient {
    async fn fetch(&self, bounds: ViewportBounds) -> Result<Vec<Anomaly>, FetchError> {
        let started = Instant::now();
        let outcome = self.fetch_url(self.request_url(&bounds)).await;
        metrics::histogram!("viewport_fetch_seconds").record(started.elapsed().as_secs_f64());
        if let Err(err) = &outcome {
            metrics::counter!("viewport_fetch_errors_total", "kind" => err.kind().label())
                .increment(1);
        }
        outcome
    }
}

/// Best-effort summary of an error response body.
fn status_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: Some(error),
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ErrorBody {
            error: Some(error), ..
        }) => error,
        _ if body.is_empty() => "no details".to_string(),
        _ => String::from_utf8_lossy(body).into_owned(),
    }
}
