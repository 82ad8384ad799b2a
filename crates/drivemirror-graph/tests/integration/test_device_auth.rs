//! Device-code sign-in and token cache behavior against a mock authority

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_core::ports::{ICredentialRefresher, Tokens};
use drivemirror_graph::{AccountAuthenticator, DeviceAuthConfig, GraphRefresher, TokenCacheFile};

fn test_config(server: &MockServer) -> DeviceAuthConfig {
    DeviceAuthConfig::new("client-under-test")
        .with_authority(server.uri())
        .without_browser()
}

fn cache_in(dir: &TempDir) -> TokenCacheFile {
    TokenCacheFile::new(dir.path().join("tokens.json"))
}

fn expired_tokens(refresh: Option<&str>) -> Tokens {
    Tokens {
        access_token: "at-stale".to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_at: Utc::now() - Duration::minutes(5),
    }
}

/// Mounts a device authorization endpoint that approves instantly
async fn mount_device_endpoints(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/devicecode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dc-123",
            "user_code": "ABC-DEF",
            "verification_uri": "https://contoso.example/signin",
            "expires_in": 900,
            "interval": 0,
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("device_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-device",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "rt-device",
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sign_in_completes_the_device_flow_and_caches() {
    let server = MockServer::start().await;
    mount_device_endpoints(&server).await;
    let dir = TempDir::new().unwrap();
    let auth = AccountAuthenticator::new(&test_config(&server), cache_in(&dir)).unwrap();

    let tokens = auth.sign_in().await.unwrap();
    assert_eq!(tokens.access_token, "at-device");
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-device"));

    // a second sign-in is served from the cache alone
    server.reset().await;
    let again = auth.sign_in().await.unwrap();
    assert_eq!(again.access_token, "at-device");
}

#[tokio::test]
async fn expired_cache_renews_through_the_refresh_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-renewed",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    cache_in(&dir).store(&expired_tokens(Some("rt-old"))).unwrap();

    let auth = AccountAuthenticator::new(&test_config(&server), cache_in(&dir)).unwrap();
    let tokens = auth.sign_in().await.unwrap();
    assert_eq!(tokens.access_token, "at-renewed");
    // the grant returned no refresh token: the previous one is kept
    assert_eq!(tokens.refresh_token.as_deref(), Some("rt-old"));

    let cached = cache_in(&dir).load().unwrap().unwrap();
    assert_eq!(cached.access_token, "at-renewed");
}

#[tokio::test]
async fn expired_cache_without_refresh_token_reprompts() {
    let server = MockServer::start().await;
    mount_device_endpoints(&server).await;
    let dir = TempDir::new().unwrap();
    cache_in(&dir).store(&expired_tokens(None)).unwrap();

    let auth = AccountAuthenticator::new(&test_config(&server), cache_in(&dir)).unwrap();
    let tokens = auth.sign_in().await.unwrap();
    assert_eq!(tokens.access_token, "at-device");
}

#[tokio::test]
async fn rejected_refresh_falls_back_to_the_device_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The refresh token has expired.",
        })))
        .mount(&server)
        .await;
    mount_device_endpoints(&server).await;
    let dir = TempDir::new().unwrap();
    cache_in(&dir).store(&expired_tokens(Some("rt-dead"))).unwrap();

    let auth = AccountAuthenticator::new(&test_config(&server), cache_in(&dir)).unwrap();
    let tokens = auth.sign_in().await.unwrap();
    assert_eq!(tokens.access_token, "at-device");
}

#[tokio::test]
async fn refresher_skips_the_cached_token_and_renews() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/common/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-renewed",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    // unexpired on paper, but the service has just rejected it
    cache_in(&dir)
        .store(&Tokens {
            access_token: "at-rejected".to_string(),
            refresh_token: Some("rt-live".to_string()),
            expires_at: Utc::now() + Duration::minutes(30),
        })
        .unwrap();

    let auth = AccountAuthenticator::new(&test_config(&server), cache_in(&dir)).unwrap();
    let refresher = GraphRefresher::new(auth);
    let bearer = refresher.refresh().await.unwrap();
    assert_eq!(bearer, "at-renewed");
}
