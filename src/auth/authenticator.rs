//! Authenticator implementation
//!
//! Applies credentials to requests. Auth types that need a login keep their
//! token in a [`TokenCache`] keyed by credential identity, so every
//! extractor using the same account reuses one login.

use super::cache::TokenCache;
use super::types::{AuthConfig, CachedToken, Location};
use crate::error::{Error, Result};
use crate::jsonpath::{extract_string, extract_u64};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Refresh tokens handed out by rotating OAuth servers live this long in the cache
const ROTATED_REFRESH_MAX_AGE: Duration = Duration::from_secs(36500 * 86400);

/// Tokens are refreshed this long before the server says they expire
const EXPIRY_BUFFER: Duration = Duration::from_secs(30);

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// Shared token cache
    cache: Arc<TokenCache>,
    /// Cache key for this credential
    key: Option<String>,
    /// Lifetime override for cached logins
    max_age: Option<Duration>,
    /// HTTP client for login requests
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator with its own private token cache
    pub fn new(config: AuthConfig) -> Self {
        Self::with_cache(config, Arc::new(TokenCache::default()))
    }

    /// Create an authenticator backed by a shared token cache
    pub fn with_cache(config: AuthConfig, cache: Arc<TokenCache>) -> Self {
        let key = config.cache_key();
        Self {
            config,
            cache,
            key,
            max_age: None,
            http_client: Client::new(),
        }
    }

    /// Use a custom HTTP client for login requests
    #[must_use]
    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Override how long a login stays valid
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Override the credential identity used as cache key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Apply authentication to a request builder
    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.config {
            AuthConfig::None => Ok(req),

            AuthConfig::ApiKey {
                location,
                name,
                prefix,
                value,
            } => {
                let val = format!("{}{}", prefix.as_deref().unwrap_or(""), value);
                match location {
                    Location::Header => Ok(req.header(name.as_str(), val)),
                    Location::Query => Ok(req.query(&[(name.as_str(), val)])),
                }
            }

            AuthConfig::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }

            AuthConfig::Bearer { token } => Ok(req.bearer_auth(token)),

            AuthConfig::Session {
                token_header,
                token_prefix,
                ..
            } => {
                let token = self.token().await?;
                let value = format!("{}{}", token_prefix.as_deref().unwrap_or(""), token);
                Ok(req.header(token_header.as_str(), value))
            }

            AuthConfig::Oauth2ClientCredentials { .. } | AuthConfig::Oauth2Refresh { .. } => {
                let token = self.token().await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    /// Get a valid token, logging in if the cache has none
    pub async fn token(&self) -> Result<String> {
        let key = self.cache_key()?;
        let max_age = self.max_age.unwrap_or_else(|| self.cache.max_age());
        self.cache
            .get_or_create_with(key, max_age, || self.login())
            .await
    }

    /// Drop the cached token after the server rejected it
    pub async fn invalidate(&self) {
        if let Some(key) = &self.key {
            self.cache.invalidate(key).await;
        }
    }

    /// Invalidate the cached token and log in again
    ///
    /// Static credentials cannot be refreshed, so expiry is reported as an
    /// authentication failure for them.
    pub async fn reauthenticate(&self) -> Result<()> {
        if !self.config.needs_login() {
            return Err(Error::auth("credentials were rejected and cannot be refreshed"));
        }
        info!("Refreshing credentials");
        self.invalidate().await;
        self.token().await.map(|_| ())
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The shared cache backing this authenticator
    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    fn cache_key(&self) -> Result<&str> {
        self.key
            .as_deref()
            .ok_or_else(|| Error::auth("Token login not supported for this auth type"))
    }

    /// Perform the network login for this auth type
    async fn login(&self) -> Result<CachedToken> {
        match &self.config {
            AuthConfig::Session {
                login_url,
                login_body,
                form,
                token_path,
                expires_in_path,
                ..
            } => {
                self.login_session(
                    login_url,
                    login_body,
                    *form,
                    token_path,
                    expires_in_path.as_deref(),
                )
                .await
            }

            AuthConfig::Oauth2ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
            } => {
                self.login_client_credentials(token_url, client_id, client_secret, scopes)
                    .await
            }

            AuthConfig::Oauth2Refresh {
                token_url,
                client_id,
                client_secret,
                refresh_token,
            } => {
                self.login_refresh(token_url, client_id, client_secret, refresh_token)
                    .await
            }

            _ => Err(Error::auth(
                "Token login not supported for this auth type",
            )),
        }
    }

    /// Log in through a session endpoint
    async fn login_session(
        &self,
        login_url: &str,
        login_body: &HashMap<String, String>,
        form: bool,
        token_path: &str,
        expires_in_path: Option<&str>,
    ) -> Result<CachedToken> {
        debug!("Logging in at {login_url}");
        let req = self.http_client.post(login_url);
        let req = if form {
            req.form(login_body)
        } else {
            req.json(login_body)
        };
        let response = req.send().await.map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth {
                message: format!("Login request failed with status {status}: {body}"),
            });
        }

        let body: Value = response.json().await.map_err(Error::Http)?;

        let token = extract_string(&body, token_path)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth {
                message: format!("Could not extract token from path: {token_path}"),
            })?;

        let lifetime = expires_in_path
            .and_then(|path| extract_u64(&body, path))
            .map(Duration::from_secs);

        Ok(match lifetime {
            Some(lifetime) => {
                CachedToken::expires_in(token, lifetime.saturating_sub(EXPIRY_BUFFER))
            }
            None => CachedToken::new(token),
        })
    }

    /// Fetch OAuth2 token using client credentials flow
    async fn login_client_credentials(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
    ) -> Result<CachedToken> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
        ];
        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }

        let token = self
            .token_request(token_url, &form)
            .await
            .map_err(|e| Error::OAuth2 {
                message: e.to_string(),
            })?;
        Ok(token.into_cached_token())
    }

    /// Fetch OAuth2 token using refresh token flow
    ///
    /// Servers that rotate refresh tokens return a new one with every access
    /// token; it is kept in the cache and used for the next refresh.
    async fn login_refresh(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<CachedToken> {
        let rotation_key = format!("refresh:{}", self.cache_key()?);
        let current = self
            .cache
            .get_with(&rotation_key, ROTATED_REFRESH_MAX_AGE)
            .await
            .unwrap_or_else(|| refresh_token.to_string());

        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
            ("refresh_token", current.clone()),
        ];

        let mut token = self
            .token_request(token_url, &form)
            .await
            .map_err(|e| Error::TokenRefresh {
                message: e.to_string(),
            })?;

        if let Some(rotated) = token.refresh_token.take() {
            if rotated != current {
                debug!("Storing rotated refresh token");
                self.cache
                    .insert(
                        &rotation_key,
                        CachedToken::expires_in(rotated, ROTATED_REFRESH_MAX_AGE),
                    )
                    .await;
            }
        }

        Ok(token.into_cached_token())
    }

    async fn token_request(
        &self,
        token_url: &str,
        form: &[(&str, String)],
    ) -> Result<TokenResponse> {
        let response = self
            .http_client
            .post(token_url)
            .form(form)
            .send()
            .await
            .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Other(format!(
                "Token request failed with status {status}: {body}"
            )));
        }

        response.json().await.map_err(Error::Http)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("key", &self.key)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_cached_token(self) -> CachedToken {
        match self.expires_in {
            Some(secs) => CachedToken::expires_in(
                self.access_token,
                Duration::from_secs(secs).saturating_sub(EXPIRY_BUFFER),
            ),
            None => CachedToken::new(self.access_token),
        }
    }
}
