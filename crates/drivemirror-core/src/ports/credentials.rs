//! Credential refresher port
//!
//! The poll loop can hit authorization expiry minutes into a run. The
//! refresh itself is interactive in the shipped CLI (device-code prompt),
//! so it is abstracted behind [`ICredentialRefresher`] and invoked under
//! the engine's single-flight gate; the polling protocol never knows how
//! the new token was obtained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth tokens as acquired and persisted by the auth adapter
///
/// Contains the access token for API requests, an optional refresh token
/// for renewing it without user interaction, and the expiration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    /// (requires the `offline_access` scope)
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    #[must_use]
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

/// Port trait for supplying a fresh access token mid-run
///
/// Called at most once per expiry across all concurrent pollers (the
/// refresh coordinator serializes callers and skips redundant refreshes).
/// Implementations may block for a long time, e.g. waiting for a user to
/// complete a device-code prompt.
#[async_trait::async_trait]
pub trait ICredentialRefresher: Send + Sync {
    /// Obtain a fresh access token for the account this refresher serves
    ///
    /// # Returns
    /// The new bearer token; the caller installs it into the shared store.
    async fn refresh(&self) -> anyhow::Result<String>;
}
