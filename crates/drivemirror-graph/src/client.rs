//! Authenticated HTTP transport for the Graph adapter
//!
//! Wraps a [`reqwest::Client`] with the Graph base URL, bearer injection
//! and transparent throttling retry. The bearer is read from the shared
//! [`TokenStore`] on every attempt, so a token installed mid-run by the
//! refresh protocol is picked up without rebuilding anything.
//!
//! Throttling (429) is retried here with the service's `Retry-After`
//! hint; every other status is returned to the caller, because what
//! counts as an error depends on the operation (a 404 on a path lookup
//! is a valid "not found", a 401 on a monitor poll is a status).

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{info, warn};

use drivemirror_core::token::TokenStore;

/// Production Microsoft Graph endpoint
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Backoff used when a 429 carries no usable `Retry-After` header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Attempts per request before throttling is reported as an error
const MAX_THROTTLE_RETRIES: u32 = 5;

/// Longest delay honored from an HTTP-date `Retry-After`
const MAX_RETRY_AFTER_SECS: i64 = 3600;

/// HTTP client bound to one account's token store
///
/// One instance serves one signed-in account; a cross-account mirror
/// holds two, each with its own store.
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl GraphClient {
    /// Creates a client against the production Graph endpoint
    pub fn new(tokens: Arc<TokenStore>) -> Self {
        Self::with_base_url(tokens, GRAPH_BASE_URL)
    }

    /// Creates a client against a custom endpoint (used by tests)
    pub fn with_base_url(tokens: Arc<TokenStore>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            tokens,
        }
    }

    /// Endpoint this client addresses, without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issues a request against a path under the base URL
    ///
    /// `path` must start with `/`. The optional body is sent as JSON.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        self.send_url(method, &url, body).await
    }

    /// Issues a request against an absolute URL
    ///
    /// Pagination cursors and copy monitor handles carry full URLs minted
    /// by the service, so they bypass the base-URL join.
    pub async fn send_url(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        for attempt in 1..=MAX_THROTTLE_RETRIES {
            // Rebuilt each attempt: request bodies are not reusable after
            // a send, and the bearer may have rotated during the backoff.
            let mut request = self
                .http
                .request(method.clone(), url)
                .bearer_auth(self.tokens.bearer());
            if let Some(json) = body {
                request = request.json(json);
            }
            let response = request
                .send()
                .await
                .with_context(|| format!("request to {url} failed"))?;

            if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let delay = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
            info!(
                url,
                attempt,
                delay_ms = delay.as_millis(),
                "throttled by the service, backing off"
            );
            tokio::time::sleep(delay).await;
        }
        anyhow::bail!("request to {url} still throttled after {MAX_THROTTLE_RETRIES} attempts")
    }
}

// ============================================================================
// Response helpers
// ============================================================================

/// Graph error envelope, decoded to surface the remote diagnostic
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Decodes a success response as JSON, or converts a failure into an
/// error carrying the remote diagnostic
pub(crate) async fn decode<T: DeserializeOwned>(what: &str, response: Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(response_error(what, response).await);
    }
    response
        .json()
        .await
        .with_context(|| format!("failed to decode {what} response"))
}

/// Builds an error from a non-success response
///
/// Graph wraps diagnostics in an `error` envelope; when the body parses,
/// the error code and message are surfaced verbatim, otherwise the raw
/// body is attached truncated.
pub(crate) async fn response_error(what: &str, response: Response) -> anyhow::Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        if let Some(detail) = envelope.error {
            let code = detail.code.unwrap_or_else(|| "unknown".to_string());
            let message = detail.message.unwrap_or_default();
            return anyhow::anyhow!("{what} failed with {status}: {code}: {message}");
        }
    }
    let excerpt: String = body.chars().take(200).collect();
    anyhow::anyhow!("{what} failed with {status}: {excerpt}")
}

/// Reads the `Retry-After` header when the response carries one
pub(crate) fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("Retry-After")
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_retry_after(value, DEFAULT_RETRY_AFTER))
}

/// Parses a `Retry-After` value as delta-seconds or an HTTP-date
///
/// Dates are capped at one hour; an unparseable value falls back to
/// `default`.
fn parse_retry_after(value: &str, default: Duration) -> Duration {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Duration::from_secs(seconds);
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        let until = date.signed_duration_since(chrono::Utc::now());
        let seconds = until.num_seconds().clamp(0, MAX_RETRY_AFTER_SECS);
        return Duration::from_secs(seconds as u64);
    }
    warn!(value, "unparseable Retry-After header, using the default");
    default
}
