//! CLI subcommand implementations

pub mod auth;
pub mod config;
pub mod mirror;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use drivemirror_core::config::{AuthConfig, Config};
use drivemirror_core::token::TokenStore;
use drivemirror_graph::{
    AccountAuthenticator, DeviceAuthConfig, GraphClient, GraphTreeService, TokenCacheFile,
};

/// Which of the two signed-in accounts a command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AccountSlot {
    /// The account the tree is read from
    Source,
    /// The account the tree is written into
    Dest,
}

impl AccountSlot {
    pub fn label(self) -> &'static str {
        match self {
            AccountSlot::Source => "source",
            AccountSlot::Dest => "destination",
        }
    }

    pub fn cache_path(self, auth: &AuthConfig) -> PathBuf {
        match self {
            AccountSlot::Source => auth.source_cache_path(),
            AccountSlot::Dest => auth.dest_cache_path(),
        }
    }
}

/// Builds the device-flow authenticator for one account slot
pub(crate) fn authenticator(config: &Config, slot: AccountSlot) -> Result<AccountAuthenticator> {
    anyhow::ensure!(
        !config.auth.client_id.is_empty(),
        "auth.client_id is not set; run `drivemirror config init` and fill in \
         your application (client) ID"
    );
    let device = DeviceAuthConfig::new(config.auth.client_id.clone())
        .with_tenant(config.auth.tenant.clone());
    let cache = TokenCacheFile::new(slot.cache_path(&config.auth));
    AccountAuthenticator::new(&device, cache)
}

/// Signs one account in (from cache or interactively) and connects its
/// default drive
pub(crate) async fn connect_account(
    config: &Config,
    slot: AccountSlot,
) -> Result<(Arc<GraphTreeService>, Arc<TokenStore>, AccountAuthenticator)> {
    let authenticator = authenticator(config, slot)?;
    let tokens = authenticator
        .sign_in()
        .await
        .with_context(|| format!("signing in the {} account failed", slot.label()))?;
    let store = Arc::new(TokenStore::new(tokens.access_token));
    let client = GraphClient::new(Arc::clone(&store));
    let service = GraphTreeService::connect(client)
        .await
        .with_context(|| format!("connecting the {} account's drive failed", slot.label()))?;
    Ok((Arc::new(service), store, authenticator))
}
