//! Response classification
//!
//! Maps `(status, headers, body)` to what the controller should do next.
//! Waits announced by the server are taken from `Retry-After`,
//! `X-RateLimit-Retry-After` and `x-ratelimit-reset` style headers.

use crate::error::{is_retryable_status, Error, Result};
use crate::http::HttpResponse;
use crate::jsonpath;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Wait used for a rate limit that names no reset time
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(600);

/// Wait used when a "slow down" page is served instead of content
pub const DEFAULT_RISK_CONTROL_WAIT: Duration = Duration::from_secs(300);

/// Reset values above this are epoch timestamps rather than deltas
const EPOCH_THRESHOLD: f64 = 1_000_000_000.0;

/// Outcome of inspecting one response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The response holds a page
    Success,
    /// Wait this long, then repeat the identical request
    RetryAfter(Duration),
    /// Temporary failure, repeat after the policy backoff
    Transient,
    /// Credentials were rejected
    AuthExpired,
    /// Give up
    Fatal,
}

impl Classification {
    /// Turn the classification into the matching error, if any
    pub fn check(self, response: &HttpResponse) -> Result<()> {
        let status = response.status;
        match self {
            Classification::Success => Ok(()),
            Classification::RetryAfter(wait) => Err(Error::rate_limited(wait)),
            Classification::Transient if is_retryable_status(status) => {
                Err(Error::http_status(status, snippet(&response.text)))
            }
            Classification::Transient => Err(Error::transient(format!(
                "HTTP {status} from {}",
                response.url
            ))),
            Classification::AuthExpired => Err(Error::auth_expired(format!(
                "HTTP {status} from {}",
                response.url
            ))),
            Classification::Fatal if status == 404 => Err(Error::not_found(&response.url)),
            Classification::Fatal => Err(Error::http_status(status, snippet(&response.text))),
        }
    }
}

/// Decides how a response should be handled
pub trait Classifier: Send + Sync {
    /// Classify a response from its parts
    fn classify(&self, status: u16, headers: &HeaderMap, body: &str) -> Classification;

    /// Classify a buffered response
    fn classify_response(&self, response: &HttpResponse) -> Classification {
        self.classify(response.status, &response.headers, &response.text)
    }
}

/// Classify with the default rules
pub fn classify_response(status: u16, headers: &HeaderMap, body: &str) -> Classification {
    HttpClassifier::default().classify(status, headers, body)
}

/// Status and header driven classifier
///
/// Rules, first match wins:
/// 1. `429` waits for the announced time or `rate_limit_wait`
/// 2. statuses in `auth_statuses` expire credentials
/// 3. a body matching `risk_control` waits `risk_control_wait`
/// 4. `5xx` retries, honoring `Retry-After` if present
/// 5. any other `4xx` is fatal
/// 6. a truthy value at `error_path` in a 2xx JSON body is fatal
/// 7. `x-ratelimit-remaining` below `remaining_threshold` waits for the reset
#[derive(Debug, Clone)]
pub struct HttpClassifier {
    /// Fallback wait for rate limits
    pub rate_limit_wait: Duration,
    /// Wait for risk control pages
    pub risk_control_wait: Duration,
    /// Body pattern identifying a risk control page
    pub risk_control: Option<Regex>,
    /// JSON path of an error envelope in successful responses
    pub error_path: Option<String>,
    /// Statuses meaning the credentials expired
    pub auth_statuses: Vec<u16>,
    /// Proactively wait when fewer requests than this remain
    pub remaining_threshold: Option<f64>,
}

impl Default for HttpClassifier {
    fn default() -> Self {
        Self {
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            risk_control_wait: DEFAULT_RISK_CONTROL_WAIT,
            risk_control: None,
            error_path: None,
            auth_statuses: vec![401],
            remaining_threshold: None,
        }
    }
}

impl HttpClassifier {
    /// Create a classifier with default rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback rate limit wait
    #[must_use]
    pub fn rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// Recognize risk control pages by a body pattern
    #[must_use]
    pub fn risk_control(mut self, pattern: Regex, wait: Duration) -> Self {
        self.risk_control = Some(pattern);
        self.risk_control_wait = wait;
        self
    }

    /// Treat a truthy value at `path` as an error envelope
    #[must_use]
    pub fn error_path(mut self, path: impl Into<String>) -> Self {
        self.error_path = Some(path.into());
        self
    }

    /// Statuses that mean the credentials expired
    #[must_use]
    pub fn auth_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.auth_statuses = statuses;
        self
    }

    /// Wait for the reset once fewer than `threshold` requests remain
    #[must_use]
    pub fn remaining_threshold(mut self, threshold: f64) -> Self {
        self.remaining_threshold = Some(threshold);
        self
    }

    fn has_error_envelope(&self, body: &str) -> bool {
        let Some(path) = &self.error_path else {
            return false;
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|json| jsonpath::lookup(&json, path).cloned())
            .is_some_and(|value| jsonpath::is_truthy(&value))
    }

    fn below_remaining_threshold(&self, headers: &HeaderMap) -> bool {
        let Some(threshold) = self.remaining_threshold else {
            return false;
        };
        header_str(headers, "x-ratelimit-remaining")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .is_some_and(|remaining| remaining < threshold)
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, status: u16, headers: &HeaderMap, body: &str) -> Classification {
        let now = Utc::now();

        if status == 429 {
            return Classification::RetryAfter(
                announced_wait(headers, now).unwrap_or(self.rate_limit_wait),
            );
        }

        if self.auth_statuses.contains(&status) {
            return Classification::AuthExpired;
        }

        if self
            .risk_control
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(body))
        {
            return Classification::RetryAfter(self.risk_control_wait);
        }

        if status >= 500 || is_retryable_status(status) {
            return match announced_wait(headers, now) {
                Some(wait) => Classification::RetryAfter(wait),
                None => Classification::Transient,
            };
        }

        if status >= 400 || self.has_error_envelope(body) {
            return Classification::Fatal;
        }

        if self.below_remaining_threshold(headers) {
            return Classification::RetryAfter(
                announced_wait(headers, now).unwrap_or(self.rate_limit_wait),
            );
        }

        Classification::Success
    }
}

/// Wait announced by any of the supported headers
fn announced_wait(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    header_str(headers, "retry-after")
        .and_then(|v| parse_retry_after(v, now))
        .or_else(|| header_str(headers, "x-ratelimit-retry-after").and_then(|v| parse_reset(v, now)))
        .or_else(|| header_str(headers, "x-ratelimit-reset").and_then(|v| parse_reset(v, now)))
        .or_else(|| header_str(headers, "ratelimit-reset").and_then(|v| parse_reset(v, now)))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Parse a `Retry-After` value: delay in seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    Some(until(date.with_timezone(&Utc), now))
}

/// Parse a rate limit reset value: delta seconds or an epoch timestamp
pub fn parse_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    if value < EPOCH_THRESHOLD {
        return Some(Duration::from_secs_f64(value));
    }

    // millisecond timestamps have 13 digits
    let secs = if value >= EPOCH_THRESHOLD * 1000.0 {
        value / 1000.0
    } else {
        value
    };
    let reset = DateTime::<Utc>::from_timestamp(secs as i64, 0)?;
    Some(until(reset, now))
}

fn until(when: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (when - now).to_std().unwrap_or(Duration::ZERO)
}

fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
