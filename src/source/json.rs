//! Configurable source for JSON APIs
//!
//! Covers the common shape of media-site APIs: a list endpoint returning an
//! array of records somewhere in the body, plus a token, URL, flag or total
//! telling how to reach the next page.

use super::{ItemSource, PageRequest};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::http::{HttpResponse, RequestConfig, Requestor};
use crate::jsonpath;
use crate::pagination::{Cursor, Page, PageSignal, Paginator};
use crate::retry::{Classifier, HttpClassifier};
use crate::types::{Method, OptionStringExt};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// JSON paths locating the next-page information in a response
#[derive(Debug, Clone, Default)]
pub struct SignalPaths {
    /// Continuation token
    pub next_token: Option<String>,
    /// Next page URL in the body
    pub next_url: Option<String>,
    /// `Link` header relation used when the body has no next URL
    pub link_rel: Option<String>,
    /// More-pages flag
    pub has_more: Option<String>,
    /// Total item count
    pub total: Option<String>,
    /// Id of the last item
    pub last_id: Option<String>,
}

/// Request and response layout of a JSON list endpoint
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Endpoint URL
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Fixed query parameters
    pub params: HashMap<String, String>,
    /// Extra headers
    pub headers: HashMap<String, String>,
    /// JSON body for POST endpoints
    pub body: Option<Value>,
    /// Path of the record array, `None` when the body is the array
    pub records_path: Option<String>,
    /// Path of the id inside a record
    pub id_path: Option<String>,
    /// Next-page information
    pub signal: SignalPaths,
}

impl SourceConfig {
    /// Config for a GET endpoint at `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the record array path
    #[must_use]
    pub fn records_path(mut self, path: impl Into<String>) -> Self {
        self.records_path = Some(path.into());
        self
    }

    /// Set the record id path
    #[must_use]
    pub fn id_path(mut self, path: impl Into<String>) -> Self {
        self.id_path = Some(path.into());
        self
    }

    /// Add a fixed query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the next-page paths
    #[must_use]
    pub fn signal(mut self, signal: SignalPaths) -> Self {
        self.signal = signal;
        self
    }
}

/// Item source reading pages of JSON records
pub struct JsonApiSource {
    config: SourceConfig,
    requestor: Arc<dyn Requestor>,
    paginator: Arc<dyn Paginator>,
    classifier: Arc<dyn Classifier>,
    authenticator: Option<Arc<Authenticator>>,
}

impl JsonApiSource {
    /// Create a source
    ///
    /// `paginator` must be the one driving the page stream, since it maps
    /// cursors to request parameters here.
    pub fn new(
        config: SourceConfig,
        requestor: Arc<dyn Requestor>,
        paginator: Arc<dyn Paginator>,
    ) -> Self {
        Self {
            config,
            requestor,
            paginator,
            classifier: Arc::new(HttpClassifier::default()),
            authenticator: None,
        }
    }

    /// Use a site-specific response classifier
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Refresh credentials through `authenticator` when they expire
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Source configuration
    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Records of a response body
    ///
    /// A missing or `null` record path is an empty page.
    pub fn extract_items(&self, body: &Value) -> Result<Vec<Value>> {
        let Some(path) = self.config.records_path.as_deref() else {
            return match body {
                Value::Array(items) => Ok(items.clone()),
                _ => Err(Error::RecordExtraction {
                    path: "$".to_string(),
                    message: "response body is not an array".to_string(),
                }),
            };
        };

        match jsonpath::lookup(body, path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(other) => Err(Error::RecordExtraction {
                path: path.to_string(),
                message: format!("expected an array, found {}", json_kind(other)),
            }),
        }
    }

    /// Next-page information of a response
    pub fn extract_signal(&self, response: &HttpResponse, body: &Value) -> PageSignal {
        let paths = &self.config.signal;
        let string_at = |path: &Option<String>| {
            path.as_deref()
                .and_then(|p| jsonpath::extract_string(body, p))
                .none_if_empty()
        };

        let next_url = string_at(&paths.next_url)
            .or_else(|| paths.link_rel.as_deref().and_then(|rel| response.link(rel)))
            .map(|url| resolve_url(&response.url, &url));

        PageSignal {
            next_token: string_at(&paths.next_token),
            next_url,
            has_more: paths
                .has_more
                .as_deref()
                .and_then(|p| jsonpath::extract_bool(body, p)),
            total: paths
                .total
                .as_deref()
                .and_then(|p| jsonpath::extract_u64(body, p)),
            last_id: string_at(&paths.last_id),
        }
    }

    fn request_for(&self, cursor: &Cursor) -> (String, RequestConfig) {
        let mut config = RequestConfig::new();
        for (key, value) in &self.config.headers {
            config = config.header(key, value);
        }
        if let Some(ref body) = self.config.body {
            config = config.json(body.clone());
        }

        // A next-page URL already carries every parameter
        if let Cursor::Url(url) = cursor {
            return (url.clone(), config);
        }

        let config = config
            .queries(self.config.params.clone())
            .queries(self.paginator.request_params(cursor));
        (self.config.url.clone(), config)
    }
}

#[async_trait]
impl ItemSource for JsonApiSource {
    type Item = Value;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Value>> {
        let (url, config) = self.request_for(&request.cursor);
        debug!(
            "Requesting {url} (cursor {}, attempt {})",
            request.cursor, request.attempt
        );

        let response = self
            .requestor
            .request(self.config.method.into(), &url, config)
            .await?;
        self.classifier.classify_response(&response).check(&response)?;

        // A truncated or HTML body with a 2xx status is usually a hiccup
        let body: Value = serde_json::from_str(&response.text).map_err(|e| {
            Error::transient(format!("Invalid JSON from {}: {e}", response.url))
        })?;

        let items = self.extract_items(&body)?;
        let signal = self.extract_signal(&response, &body);
        debug!("Page {} holds {} items", request.page_index + 1, items.len());
        Ok(Page::new(items, signal))
    }

    fn item_id(&self, item: &Value) -> Option<String> {
        let path = self.config.id_path.as_deref()?;
        jsonpath::extract_string(item, path)
    }

    async fn reauthenticate(&self) -> Result<()> {
        match self.authenticator {
            Some(ref auth) => auth.reauthenticate().await,
            None => Err(Error::auth("no credentials configured for this source")),
        }
    }
}

impl std::fmt::Debug for JsonApiSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonApiSource")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .finish_non_exhaustive()
    }
}

/// Resolve a possibly relative URL against the URL it was found in
fn resolve_url(base: &str, target: &str) -> String {
    url::Url::parse(base)
        .and_then(|base| base.join(target))
        .map_or_else(|_| target.to_string(), |url| url.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
