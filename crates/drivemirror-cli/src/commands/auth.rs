//! Auth commands - sign the two accounts in and out
//!
//! Provides the `drivemirror auth` subcommands:
//! 1. `login`  - runs the device sign-in for one account slot and caches
//!    the tokens on disk.
//! 2. `status` - shows the cached token state for both slots.
//! 3. `logout` - deletes the cached tokens for one slot, or both.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use drivemirror_core::config::Config;
use drivemirror_core::ports::{ITreeService, Tokens};
use drivemirror_graph::TokenCacheFile;

use crate::commands::{connect_account, AccountSlot};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign one account in through the device flow
    Login {
        /// Which account to sign in
        #[arg(value_enum)]
        account: AccountSlot,
    },
    /// Show the cached sign-in state of both accounts
    Status,
    /// Remove cached tokens
    Logout {
        /// Which account to sign out; both when omitted
        #[arg(value_enum)]
        account: Option<AccountSlot>,
    },
}

impl AuthCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format);
        match self {
            AuthCommand::Login { account } => {
                self.execute_login(config_path, *account, &*fmt, format).await
            }
            AuthCommand::Status => self.execute_status(config_path, &*fmt, format),
            AuthCommand::Logout { account } => self.execute_logout(config_path, *account, &*fmt),
        }
    }

    /// Signs the slot in (device prompt when the cache cannot help) and
    /// confirms the identity against the service.
    async fn execute_login(
        &self,
        config_path: &Path,
        slot: AccountSlot,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let config = Config::load_or_default(config_path);

        info!(account = slot.label(), "starting device sign-in");
        let (service, _store, authenticator) = connect_account(&config, slot).await?;
        let account = service.account_info().await?;

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::json!({
                "account": slot.label(),
                "display_name": account.display_name,
                "email": account.email.as_str(),
                "cache": authenticator.cache().path().display().to_string(),
            }));
        } else {
            fmt.success(&format!(
                "signed in the {} account as {} <{}>",
                slot.label(),
                account.display_name,
                account.email
            ));
            fmt.info(&format!(
                "tokens cached at {}",
                authenticator.cache().path().display()
            ));
        }
        Ok(())
    }

    fn execute_status(
        &self,
        config_path: &Path,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
    ) -> Result<()> {
        let config = Config::load_or_default(config_path);

        let mut entries = Vec::new();
        for slot in [AccountSlot::Source, AccountSlot::Dest] {
            let cache = TokenCacheFile::new(slot.cache_path(&config.auth));
            let state = describe_tokens(cache.load());
            entries.push((slot, cache.path().display().to_string(), state));
        }

        if matches!(format, OutputFormat::Json) {
            let accounts: Vec<_> = entries
                .iter()
                .map(|(slot, cache, state)| {
                    serde_json::json!({
                        "account": slot.label(),
                        "cache": cache,
                        "status": state,
                    })
                })
                .collect();
            fmt.print_json(&serde_json::json!({ "accounts": accounts }));
        } else {
            for (slot, _, state) in &entries {
                fmt.info(&format!("{:<12} {state}", format!("{}:", slot.label())));
            }
            if entries.iter().any(|(_, _, state)| state == "not signed in") {
                fmt.info("run 'drivemirror auth login <account>' to sign in");
            }
        }
        Ok(())
    }

    fn execute_logout(
        &self,
        config_path: &Path,
        slot: Option<AccountSlot>,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        let config = Config::load_or_default(config_path);

        for slot in slots_for(slot) {
            let cache = TokenCacheFile::new(slot.cache_path(&config.auth));
            if !cache.path().exists() {
                fmt.info(&format!("{} account was not signed in", slot.label()));
                continue;
            }
            cache
                .clear()
                .with_context(|| format!("clearing the {} account cache", slot.label()))?;
            info!(account = slot.label(), "cleared cached tokens");
            fmt.success(&format!("signed out the {} account", slot.label()));
        }
        Ok(())
    }
}

fn slots_for(slot: Option<AccountSlot>) -> Vec<AccountSlot> {
    match slot {
        Some(slot) => vec![slot],
        None => vec![AccountSlot::Source, AccountSlot::Dest],
    }
}

/// One-line description of a cached token load for `auth status`.
fn describe_tokens(loaded: Result<Option<Tokens>>) -> String {
    match loaded {
        Ok(Some(tokens)) if !tokens.is_expired() => format!(
            "valid until {}",
            tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        Ok(Some(tokens)) if tokens.refresh_token.is_some() => {
            "expired (renews without a prompt)".to_string()
        }
        Ok(Some(_)) => "expired".to_string(),
        Ok(None) => "not signed in".to_string(),
        Err(_) => "cache unreadable".to_string(),
    }
}
