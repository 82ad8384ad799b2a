//! Single-flight credential refresh
//!
//! Many copy jobs poll the service concurrently; when the shared token
//! expires they all see the rejection within one poll interval. Without
//! coordination each would start its own refresh - a storm of identical
//! requests against the identity provider. [`RefreshCoordinator`]
//! serializes them: callers carry the token generation they observed
//! before the rejected call, and only a caller whose observation is still
//! current performs the refresh. Everyone else finds a newer token
//! already installed and simply retries.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing::{debug, info};

use drivemirror_core::ports::ICredentialRefresher;
use drivemirror_core::token::TokenStore;

/// Serializes credential refreshes for one account session.
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    refresher: Arc<dyn ICredentialRefresher>,
    /// The refresh gate. Held only while deciding whether to refresh and
    /// while the refresher runs.
    gate: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<TokenStore>, refresher: Arc<dyn ICredentialRefresher>) -> Self {
        Self {
            store,
            refresher,
            gate: Mutex::new(()),
        }
    }

    /// Generation of the token currently installed.
    ///
    /// Callers snapshot this before a remote call so a later
    /// [`refresh_if_stale`](Self::refresh_if_stale) can tell whether the
    /// rejection they saw predates an already-completed refresh.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    /// Refreshes the shared token unless someone already did.
    ///
    /// `observed` is the generation the caller saw before the call that
    /// came back unauthorized. If the store has moved past it by the time
    /// the gate is acquired, a concurrent caller's refresh already
    /// covers this rejection and no new refresh is performed.
    ///
    /// # Returns
    /// The generation in effect after the call; the caller should retry
    /// its rejected operation with the (possibly new) token.
    ///
    /// # Errors
    /// Propagates the refresher's failure. The gate is released on
    /// failure, so a later caller can try again.
    pub async fn refresh_if_stale(&self, observed: u64) -> anyhow::Result<u64> {
        let _guard = self.gate.lock().await;

        let current = self.store.generation();
        if current > observed {
            debug!(
                observed,
                current, "token already refreshed by a concurrent caller"
            );
            return Ok(current);
        }

        info!("access token rejected; refreshing credentials");
        let token = self
            .refresher
            .refresh()
            .await
            .context("credential refresh failed")?;
        self.store.install(token);

        let generation = self.store.generation();
        debug!(generation, "installed refreshed token");
        Ok(generation)
    }
}
