//! Shared access-token store
//!
//! One [`TokenStore`] is shared between the HTTP adapter (which reads the
//! current bearer for every request) and the refresh coordinator (which
//! installs replacements). Each install bumps a generation counter; the
//! generation a caller observed before hitting an authorization failure
//! is compared against the store's current generation after acquiring the
//! refresh gate, so concurrent failures converge on a single refresh
//! instead of a storm.

use std::sync::RwLock;

/// Thread-safe holder of the current access token and its generation
#[derive(Debug)]
pub struct TokenStore {
    inner: RwLock<TokenState>,
}

#[derive(Debug)]
struct TokenState {
    access_token: String,
    generation: u64,
}

impl TokenStore {
    /// Create a store seeded with an initial access token (generation 0)
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(TokenState {
                access_token: initial.into(),
                generation: 0,
            }),
        }
    }

    /// Current bearer token, cloned for use in a request header
    #[must_use]
    pub fn bearer(&self) -> String {
        self.inner.read().unwrap().access_token.clone()
    }

    /// Generation of the currently installed token
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.read().unwrap().generation
    }

    /// Install a refreshed token, bumping the generation
    pub fn install(&self, token: impl Into<String>) {
        let mut state = self.inner.write().unwrap();
        state.access_token = token.into();
        state.generation += 1;
    }
}
