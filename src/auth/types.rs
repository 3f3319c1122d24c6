//! Auth configuration types
//!
//! These types represent the runtime auth configuration after template
//! interpolation has been applied, and the token material kept in the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Location for API key placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Place in HTTP header
    #[default]
    Header,
    /// Place in query parameter
    Query,
}

/// Authentication configuration (after template interpolation)
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// API Key authentication (header or query)
    ApiKey {
        /// Where to place the API key
        location: Location,
        /// Header or query parameter name
        name: String,
        /// Prefix to add before the value (e.g., "Bearer ")
        prefix: Option<String>,
        /// The API key value
        value: String,
    },

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Login endpoint returning a session token
    Session {
        /// Login endpoint URL
        login_url: String,
        /// Login request body
        login_body: HashMap<String, String>,
        /// Send the body form-encoded instead of JSON
        form: bool,
        /// JSONPath to extract token from response
        token_path: String,
        /// Header name to use for the token
        token_header: String,
        /// Prefix for token value (e.g., "Bearer ")
        token_prefix: Option<String>,
        /// JSONPath to extract expiration time in seconds
        expires_in_path: Option<String>,
    },

    /// OAuth2 Client Credentials flow
    Oauth2ClientCredentials {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Requested scopes
        scopes: Vec<String>,
    },

    /// OAuth2 Refresh Token flow
    Oauth2Refresh {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Refresh token
        refresh_token: String,
    },
}

impl AuthConfig {
    /// Whether this auth type obtains its token through a login request
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            AuthConfig::Session { .. }
                | AuthConfig::Oauth2ClientCredentials { .. }
                | AuthConfig::Oauth2Refresh { .. }
        )
    }

    /// Credential identity used as the token cache key
    ///
    /// Two extractors configured with the same account share one cached login.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            AuthConfig::Session {
                login_url,
                login_body,
                ..
            } => {
                let account = ["username", "user", "email", "login"]
                    .iter()
                    .find_map(|k| login_body.get(*k))
                    .map_or("", String::as_str);
                Some(format!("session:{login_url}:{account}"))
            }
            AuthConfig::Oauth2ClientCredentials {
                token_url,
                client_id,
                ..
            } => Some(format!("oauth2:{token_url}:{client_id}")),
            AuthConfig::Oauth2Refresh {
                token_url,
                client_id,
                refresh_token,
                ..
            } => Some(format!("oauth2-refresh:{token_url}:{client_id}:{refresh_token}")),
            _ => None,
        }
    }
}

/// Token material produced by a login
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The token or cookie value
    pub value: String,
    /// When the login happened
    pub created_at: DateTime<Utc>,
    /// Lifetime announced by the server, if any
    pub max_age: Option<Duration>,
}

impl CachedToken {
    /// Create a token without a server-announced lifetime
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            created_at: Utc::now(),
            max_age: None,
        }
    }

    /// Create a token that the server says expires after `lifetime`
    pub fn expires_in(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: value.into(),
            created_at: Utc::now(),
            max_age: Some(lifetime),
        }
    }

    /// Override the creation time (tokens restored from elsewhere)
    #[must_use]
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Age of the token at `now`
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Check if the token is expired under the given cache lifetime
    ///
    /// The effective lifetime is the shorter of `max_age` and the
    /// server-announced lifetime.
    pub fn is_expired(&self, max_age: Duration) -> bool {
        self.is_expired_at(max_age, Utc::now())
    }

    /// Same as [`CachedToken::is_expired`] at a fixed instant
    pub fn is_expired_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let lifetime = self.max_age.map_or(max_age, |own| own.min(max_age));
        self.age_at(now) >= lifetime
    }
}

impl From<String> for CachedToken {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for CachedToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
