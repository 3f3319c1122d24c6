//! Tests for the auth module

use super::*;
use crate::error::Error;
use base64::Engine;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_credentials(server: &MockServer, client_id: &str) -> AuthConfig {
    AuthConfig::Oauth2ClientCredentials {
        token_url: format!("{}/oauth/token", server.uri()),
        client_id: client_id.to_string(),
        client_secret: "secret".to_string(),
        scopes: vec![],
    }
}

fn session(server: &MockServer, username: &str) -> AuthConfig {
    AuthConfig::Session {
        login_url: format!("{}/auth/login", server.uri()),
        login_body: HashMap::from([
            ("username".to_string(), username.to_string()),
            ("password".to_string(), "hunter2".to_string()),
        ]),
        form: false,
        token_path: "$.data.access_token".to_string(),
        token_header: "Authorization".to_string(),
        token_prefix: Some("Bearer ".to_string()),
        expires_in_path: Some("$.data.expires_in".to_string()),
    }
}

async fn authorization(auth: &Authenticator) -> crate::error::Result<String> {
    let client = reqwest::Client::new();
    let req = auth.apply(client.get("https://example.com/api")).await?;
    let built = req.build()?;
    Ok(built
        .headers()
        .get("Authorization")
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default())
}

// ============================================================================
// Static credentials
// ============================================================================

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let client = reqwest::Client::new();
    let req = client.get("https://example.com/api");

    let result = auth.apply(req).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_api_key_header_with_prefix() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Header,
        name: "Authorization".to_string(),
        prefix: Some("Token ".to_string()),
        value: "my-token".to_string(),
    });

    assert_eq!(authorization(&auth).await.unwrap(), "Token my-token");
}

#[tokio::test]
async fn test_api_key_query() {
    let auth = Authenticator::new(AuthConfig::ApiKey {
        location: Location::Query,
        name: "api_key".to_string(),
        prefix: None,
        value: "secret123".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap();

    let built = req.build().unwrap();
    assert!(built.url().query().unwrap().contains("api_key=secret123"));
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthConfig::Basic {
        username: "user".to_string(),
        password: "pass".to_string(),
    });

    let header = authorization(&auth).await.unwrap();
    let encoded = header.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "my-bearer-token".to_string(),
    });

    assert_eq!(authorization(&auth).await.unwrap(), "Bearer my-bearer-token");
}

#[tokio::test]
async fn test_static_credentials_cannot_reauthenticate() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "revoked".to_string(),
    });

    let err = auth.reauthenticate().await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

// ============================================================================
// Login flows
// ============================================================================

#[tokio::test]
async fn test_oauth2_client_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=my-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "oauth-token-123",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server, "my-client"));

    assert_eq!(authorization(&auth).await.unwrap(), "Bearer oauth-token-123");
}

#[tokio::test]
async fn test_oauth2_token_caching() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "cached-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server, "client"));

    for _ in 0..3 {
        assert_eq!(authorization(&auth).await.unwrap(), "Bearer cached-token");
    }
}

#[tokio::test]
async fn test_shared_cache_across_authenticators() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"access_token": "shared-session"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(TokenCache::default());
    let first = Authenticator::with_cache(session(&mock_server, "alice"), cache.clone());
    let second = Authenticator::with_cache(session(&mock_server, "alice"), cache.clone());

    assert_eq!(authorization(&first).await.unwrap(), "Bearer shared-session");
    assert_eq!(authorization(&second).await.unwrap(), "Bearer shared-session");
}

#[tokio::test]
async fn test_session_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_string_contains("alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "access_token": "session-token-xyz",
                "expires_in": 7200
            }
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(session(&mock_server, "alice"));

    assert_eq!(
        authorization(&auth).await.unwrap(),
        "Bearer session-token-xyz"
    );
}

#[tokio::test]
async fn test_session_missing_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"message": "captcha required"}
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(session(&mock_server, "alice"));
    let err = auth.token().await.unwrap_err();
    assert!(err.to_string().contains("Could not extract token"));
}

#[tokio::test]
async fn test_invalidate_forces_new_login() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "token",
            "expires_in": 3600
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server, "client"));

    auth.token().await.unwrap();
    auth.invalidate().await;
    auth.token().await.unwrap();
}

#[tokio::test]
async fn test_reauthenticate_logs_in_again() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "fresh"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server, "client"));
    auth.token().await.unwrap();
    auth.reauthenticate().await.unwrap();
}

#[tokio::test]
async fn test_oauth2_error_handling() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(client_credentials(&mock_server, "bad-client"));

    let err = authorization(&auth).await.unwrap_err();
    assert!(matches!(err, Error::OAuth2 { .. }));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_oauth2_refresh_token_rotation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "rotated",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-2",
            "refresh_token": "rotated",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = Authenticator::new(AuthConfig::Oauth2Refresh {
        token_url: format!("{}/oauth/token", mock_server.uri()),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        refresh_token: "original".to_string(),
    });

    assert_eq!(auth.token().await.unwrap(), "access-1");
    auth.invalidate().await;
    assert_eq!(auth.token().await.unwrap(), "access-2");
}

#[tokio::test]
async fn test_rotated_refresh_token_outlives_cache_max_age() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=original"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "rotated",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("refresh_token=rotated"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-2",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    // access tokens expire from the cache long before the next refresh
    let cache = Arc::new(TokenCache::new(Duration::from_millis(300)));
    let auth = Authenticator::with_cache(
        AuthConfig::Oauth2Refresh {
            token_url: format!("{}/oauth/token", mock_server.uri()),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "original".to_string(),
        },
        cache,
    );

    assert_eq!(auth.token().await.unwrap(), "access-1");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(auth.token().await.unwrap(), "access-2");
}

// ============================================================================
// TokenCache
// ============================================================================

#[tokio::test]
async fn test_cache_returns_without_login() {
    let cache = TokenCache::new(Duration::from_secs(3600));
    let counter = AtomicUsize::new(0);
    let calls = &counter;

    for _ in 0..3 {
        let token = cache
            .get_or_create("site:alice", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>("t1".to_string())
            })
            .await
            .unwrap();
        assert_eq!(token, "t1");
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_at_most_one_concurrent_login() {
    let cache = Arc::new(TokenCache::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                cache
                    .get_or_create("site:alice", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok::<_, Error>("slow-token".to_string())
                    })
                    .await
            })
        })
        .collect();

    for task in futures::future::join_all(tasks).await {
        assert_eq!(task.unwrap().unwrap(), "slow-token");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cache_different_keys_do_not_block() {
    let cache = Arc::new(TokenCache::default());
    let (release, gate) = tokio::sync::oneshot::channel::<()>();

    let slow = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_create("site:alice", || async move {
                    gate.await.ok();
                    Ok::<_, Error>("alice".to_string())
                })
                .await
        })
    };

    // Bob's login completes while Alice's is still pending
    let bob = tokio::time::timeout(
        Duration::from_secs(5),
        cache.get_or_create("site:bob", || async { Ok::<_, Error>("bob".to_string()) }),
    )
    .await
    .expect("login for a different key was blocked")
    .unwrap();
    assert_eq!(bob, "bob");

    release.send(()).unwrap();
    assert_eq!(slow.await.unwrap().unwrap(), "alice");
}

#[tokio::test]
async fn test_cache_expired_entry_triggers_login() {
    let cache = TokenCache::new(Duration::from_secs(3600));
    cache
        .insert(
            "site:alice",
            CachedToken::new("stale").created_at(Utc::now() - chrono::Duration::hours(2)),
        )
        .await;

    assert_eq!(cache.get("site:alice").await, None);

    let token = cache
        .get_or_create("site:alice", || async { Ok::<_, Error>("fresh") })
        .await
        .unwrap();
    assert_eq!(token, "fresh");
}

#[tokio::test]
async fn test_cache_per_call_max_age() {
    let cache = TokenCache::new(Duration::from_secs(90 * 86400));
    cache
        .insert(
            "bearer",
            CachedToken::new("old").created_at(Utc::now() - chrono::Duration::minutes(90)),
        )
        .await;

    let token = cache
        .get_or_create_with("bearer", Duration::from_secs(3600), || async {
            Ok::<_, Error>("new")
        })
        .await
        .unwrap();
    assert_eq!(token, "new");
}

#[tokio::test]
async fn test_cache_get_with_explicit_lifetime() {
    let cache = TokenCache::new(Duration::from_secs(3600));
    cache
        .insert(
            "refresh:site",
            CachedToken::new("kept").created_at(Utc::now() - chrono::Duration::hours(2)),
        )
        .await;

    assert_eq!(cache.get("refresh:site").await, None);
    assert_eq!(
        cache
            .get_with("refresh:site", Duration::from_secs(86400))
            .await
            .as_deref(),
        Some("kept")
    );
}

#[tokio::test]
async fn test_cache_login_failure_caches_nothing() {
    let cache = TokenCache::default();

    let err = cache
        .get_or_create("site:alice", || async {
            Err::<String, _>(Error::auth("wrong password"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert_eq!(cache.get("site:alice").await, None);

    let token = cache
        .get_or_create("site:alice", || async { Ok::<_, Error>("second-try") })
        .await
        .unwrap();
    assert_eq!(token, "second-try");
}

#[tokio::test]
async fn test_cache_invalidate_and_clear() {
    let cache = TokenCache::default();
    cache.insert("a", "1").await;
    cache.insert("b", "2").await;

    cache.invalidate("a").await;
    assert_eq!(cache.get("a").await, None);
    assert_eq!(cache.get("b").await.as_deref(), Some("2"));

    cache.invalidate("never-seen").await;

    cache.clear().await;
    assert_eq!(cache.get("b").await, None);
}

#[test]
fn test_global_cache_is_shared() {
    let a = TokenCache::global();
    let b = TokenCache::global();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(TokenCache::global().max_age(), DEFAULT_MAX_AGE);
}
