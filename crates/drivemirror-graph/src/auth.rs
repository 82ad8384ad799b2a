//! Device-code sign-in with a file-backed token cache
//!
//! Mirroring runs on headless boxes, so authentication uses the OAuth2
//! device authorization grant: the user is shown a URL and a short code,
//! signs in from any browser, and the flow polls the token endpoint until
//! Entra confirms. Acquired tokens are cached as JSON on disk per
//! account, so later runs reuse them - unexpired access tokens as-is,
//! expired ones through the refresh grant, with a fresh device prompt as
//! the last resort.
//!
//! [`GraphRefresher`] adapts the same fallback chain to the
//! [`ICredentialRefresher`] port for mid-run renewal; by the time it is
//! called the service has already rejected the cached token, so it skips
//! the cached fast path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    ClientId, DeviceAuthorizationUrl, EndpointNotSet, EndpointSet, RefreshToken, Scope,
    StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use drivemirror_core::ports::{ICredentialRefresher, Tokens};

/// Entra ID authority used unless overridden (sovereign clouds, tests)
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scopes requested on sign-in
///
/// `offline_access` is what makes the service issue refresh tokens.
pub const DEFAULT_SCOPES: &[&str] = &["Files.ReadWrite.All", "User.Read", "offline_access"];

/// Settings for the device-code flow of one account
#[derive(Debug, Clone)]
pub struct DeviceAuthConfig {
    /// Application (client) id of the app registration
    pub client_id: String,
    /// Tenant, or `common` for any Microsoft account
    pub tenant: String,
    /// Authority base URL, without a trailing slash
    pub authority: String,
    /// Scopes to request
    pub scopes: Vec<String>,
    /// Open the verification URL in a browser in addition to printing it
    pub open_browser: bool,
}

impl DeviceAuthConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tenant: "common".to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            open_browser: true,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        let authority: String = authority.into();
        self.authority = authority.trim_end_matches('/').to_string();
        self
    }

    /// Skip the browser launch; the URL and code are still printed
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    fn device_authorization_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/devicecode", self.authority, self.tenant)
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant)
    }
}

// ============================================================================
// Device-code flow
// ============================================================================

/// OAuth2 device authorization flow against one tenant
#[derive(Debug)]
pub struct DeviceCodeFlow {
    client: BasicClient<EndpointNotSet, EndpointSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    scopes: Vec<String>,
    open_browser: bool,
}

impl DeviceCodeFlow {
    pub fn new(config: &DeviceAuthConfig) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_device_authorization_url(
                DeviceAuthorizationUrl::new(config.device_authorization_url())
                    .context("invalid device authorization URL")?,
            )
            .set_token_uri(TokenUrl::new(config.token_url()).context("invalid token URL")?);
        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            open_browser: config.open_browser,
        })
    }

    /// Runs a full interactive device-code sign-in
    ///
    /// Prints the verification URL and user code on stderr, then blocks
    /// polling the token endpoint until the user completes sign-in or the
    /// code expires.
    pub async fn authenticate(&self) -> Result<Tokens> {
        let http_client = reqwest::Client::new();

        let mut request = self.client.exchange_device_code();
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let details: StandardDeviceAuthorizationResponse = request
            .request_async(&http_client)
            .await
            .context("device authorization request failed")?;

        let verification_url = details.verification_uri().as_str();
        let user_code = details.user_code().secret();
        info!(url = verification_url, code = user_code, "device sign-in required");
        eprintln!("To sign in, open {verification_url} and enter the code {user_code}");
        if self.open_browser {
            if let Err(err) = webbrowser::open(verification_url) {
                debug!(error = %err, "could not open a browser, use the printed URL");
            }
        }

        let token = self
            .client
            .exchange_device_access_token(&details)
            .request_async(&http_client, tokio::time::sleep, None)
            .await
            .context("device code exchange failed")?;
        info!("device sign-in completed");
        Ok(shape_tokens(token, None))
    }

    /// Renews tokens through the refresh grant
    pub async fn refresh(&self, refresh_token: &str) -> Result<Tokens> {
        debug!("refreshing access token");
        let http_client = reqwest::Client::new();
        let token = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .context("token refresh failed")?;
        Ok(shape_tokens(token, Some(refresh_token)))
    }
}

/// Shapes a token endpoint response into the persisted form
///
/// The service may omit the refresh token on renewal; the previous one
/// stays valid in that case and is carried over. Responses without an
/// expiry get a conservative one hour.
fn shape_tokens(response: BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
    let expires_at = response
        .expires_in()
        .map(|lifetime| Utc::now() + Duration::seconds(lifetime.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + Duration::hours(1));
    Tokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response
            .refresh_token()
            .map(|token| token.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at,
    }
}

// ============================================================================
// Token cache file
// ============================================================================

/// JSON token cache for one account
///
/// The file holds a serialized [`Tokens`] record. It contains a live
/// refresh token, so it is written with owner-only permissions where the
/// platform supports them.
#[derive(Debug)]
pub struct TokenCacheFile {
    path: PathBuf,
}

impl TokenCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached tokens, `None` when no cache exists yet
    pub fn load(&self) -> Result<Option<Tokens>> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read token cache {}", self.path.display())
                })
            }
        };
        let tokens = serde_json::from_str(&json).with_context(|| {
            format!("token cache {} is not valid JSON", self.path.display())
        })?;
        Ok(Some(tokens))
    }

    /// Writes the tokens, creating parent directories on demand
    pub fn store(&self, tokens: &Tokens) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(tokens).context("failed to serialize tokens")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write token cache {}", self.path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(err) =
                std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
            {
                warn!(error = %err, path = %self.path.display(), "could not restrict token cache permissions");
            }
        }
        debug!(path = %self.path.display(), "stored token cache");
        Ok(())
    }

    /// Deletes the cache; succeeds when none exists
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove token cache {}", self.path.display())
            }),
        }
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Credential acquisition for one account: cache, refresh grant, device
/// prompt - in that order
#[derive(Debug)]
pub struct AccountAuthenticator {
    flow: DeviceCodeFlow,
    cache: TokenCacheFile,
}

impl AccountAuthenticator {
    pub fn new(config: &DeviceAuthConfig, cache: TokenCacheFile) -> Result<Self> {
        Ok(Self {
            flow: DeviceCodeFlow::new(config)?,
            cache,
        })
    }

    pub fn cache(&self) -> &TokenCacheFile {
        &self.cache
    }

    /// Produces valid tokens, interacting with the user only when the
    /// cache cannot be renewed silently
    pub async fn sign_in(&self) -> Result<Tokens> {
        if let Some(tokens) = self.cache.load()? {
            if !tokens.is_expired() {
                debug!("using cached access token");
                return Ok(tokens);
            }
        }
        self.renew().await
    }

    /// Renews credentials even when the cached access token has not
    /// reached its recorded expiry; used once the service has rejected it
    pub async fn renew(&self) -> Result<Tokens> {
        if let Some(cached) = self.cache.load()? {
            if let Some(refresh_token) = cached.refresh_token.as_deref() {
                match self.flow.refresh(refresh_token).await {
                    Ok(renewed) => {
                        self.cache.store(&renewed)?;
                        return Ok(renewed);
                    }
                    Err(err) => {
                        warn!(error = %err, "refresh token rejected, starting device sign-in");
                    }
                }
            }
        }
        let tokens = self.flow.authenticate().await?;
        self.cache.store(&tokens)?;
        Ok(tokens)
    }
}

/// [`ICredentialRefresher`] backed by the account's refresh-or-prompt
/// chain
///
/// Invoked under the engine's single-flight gate after the service has
/// rejected the current bearer, so the cached access token is never
/// trusted here.
pub struct GraphRefresher {
    authenticator: AccountAuthenticator,
}

impl GraphRefresher {
    pub fn new(authenticator: AccountAuthenticator) -> Self {
        Self { authenticator }
    }
}

#[async_trait::async_trait]
impl ICredentialRefresher for GraphRefresher {
    async fn refresh(&self) -> Result<String> {
        let tokens = self.authenticator.renew().await?;
        Ok(tokens.access_token)
    }
}
