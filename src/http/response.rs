//! Buffered HTTP responses
//!
//! Item sources classify a response from its status, headers and body
//! before deciding whether it holds a page, so the body is read eagerly.

use crate::error::{Error, Result};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A fully read HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as text
    pub text: String,
}

impl HttpResponse {
    /// Create a response from its parts
    pub fn new(
        url: impl Into<String>,
        status: u16,
        headers: HeaderMap,
        text: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            text: text.into(),
        }
    }

    /// Read a reqwest response into memory
    pub async fn read(response: reqwest::Response) -> Result<Self> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let text = response.text().await?;
        Ok(Self {
            url,
            status,
            headers,
            text,
        })
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value as a string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON into `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text)
            .map_err(|e| Error::decode(format!("Invalid JSON from {}: {e}", self.url)))
    }

    /// Parse the body as a JSON value, `None` if it is not JSON
    pub fn json_value(&self) -> Option<Value> {
        serde_json::from_str(&self.text).ok()
    }

    /// URL for the given relation in the `Link` header
    pub fn link(&self, rel: &str) -> Option<String> {
        self.header("link")
            .and_then(|header| parse_link_header(header, rel))
            .filter(|url| !url.is_empty())
    }
}

/// Parse a Link header (RFC 5988) and extract the URL for the given rel
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if let Some(inner) = segment.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                url = Some(inner);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}
