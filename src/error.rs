//! Error types for extractkit
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Every error also has a [`Disposition`]: the retry controller uses it to
//! decide between waiting and retrying the same request, refreshing
//! credentials, or aborting the run.

use std::time::Duration;
use thiserror::Error;

/// The main error type for extractkit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Credentials expired: {message}")]
    AuthExpired { message: String },

    #[error("Token refresh failed: {message}")]
    TokenRefresh { message: String },

    #[error("OAuth2 error: {message}")]
    OAuth2 { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {}s", .wait.as_secs())]
    RateLimited { wait: Duration },

    #[error("Temporary failure: {message}")]
    Transient { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<Error> },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Pagination Errors
    // ============================================================================
    #[error("Stuck pagination: next cursor repeats '{cursor}'")]
    StuckPagination { cursor: String },

    #[error("Invalid cursor '{value}': {message}")]
    InvalidCursor { value: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Extraction failed: {message}")]
    Extraction { message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

/// How the retry controller should react to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Retry the identical request, after the given wait if the server named one
    Retry(Option<Duration>),
    /// Refresh credentials, then retry once
    AuthExpired,
    /// Abort the run
    Fatal,
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an expired-credentials error
    pub fn auth_expired(message: impl Into<String>) -> Self {
        Self::AuthExpired {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a rate limit error carrying the wait announced by the server
    pub fn rate_limited(wait: Duration) -> Self {
        Self::RateLimited { wait }
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a stuck pagination error
    pub fn stuck(cursor: impl Into<String>) -> Self {
        Self::StuckPagination {
            cursor: cursor.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self.disposition(), Disposition::Retry(_))
    }

    /// Classify this error for the retry controller
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::RateLimited { wait } => Disposition::Retry(Some(*wait)),
            Error::Transient { .. } | Error::Timeout { .. } => Disposition::Retry(None),
            Error::Http(e) if e.is_timeout() || e.is_connect() => Disposition::Retry(None),
            Error::HttpStatus { status, .. } if is_retryable_status(*status) => {
                Disposition::Retry(None)
            }
            Error::AuthExpired { .. } => Disposition::AuthExpired,
            _ => Disposition::Fatal,
        }
    }
}

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}

/// Result type alias for extractkit
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("username");
        assert_eq!(err.to_string(), "Missing required config field: username");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::rate_limited(Duration::from_secs(5));
        assert_eq!(err.to_string(), "Rate limited, retry after 5s");

        let err = Error::stuck("p1");
        assert_eq!(err.to_string(), "Stuck pagination: next cursor repeats 'p1'");
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::rate_limited(Duration::from_secs(60)).is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::transient("truncated body").is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(401, "").is_retryable());
        assert!(!Error::http_status(404, "").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::stuck("abc").is_retryable());
    }

    #[test]
    fn test_disposition() {
        assert_eq!(
            Error::rate_limited(Duration::from_secs(2)).disposition(),
            Disposition::Retry(Some(Duration::from_secs(2)))
        );
        assert_eq!(
            Error::http_status(502, "").disposition(),
            Disposition::Retry(None)
        );
        assert_eq!(
            Error::auth_expired("session gone").disposition(),
            Disposition::AuthExpired
        );
        assert_eq!(Error::auth("bad password").disposition(), Disposition::Fatal);
        assert_eq!(Error::Cancelled.disposition(), Disposition::Fatal);

        let exhausted = Error::RetriesExhausted {
            attempts: 3,
            last: Box::new(Error::http_status(503, "")),
        };
        assert_eq!(exhausted.disposition(), Disposition::Fatal);
        assert_eq!(exhausted.to_string(), "Giving up after 3 attempts: HTTP 503: ");
    }
}
