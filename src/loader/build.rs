//! Definition to runtime conversion
//!
//! Renders the templates of a definition and assembles the HTTP client,
//! authenticator, item source, page stream and driver of one run.

use crate::auth::{AuthConfig, Authenticator, TokenCache};
use crate::error::{Error, Result};
use crate::extractor::{Driver, DriverConfig, JsonGroups};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig};
use crate::loader::types::{
    AuthDefinition, AuthKind, ExtractorDefinition, HttpDefinition, PaginationDefinition,
    RetryDefinition,
};
use crate::pagination::{
    Cursor, CursorPaginator, KeysetPaginator, NextUrlPaginator, NoPaginator, OffsetPaginator,
    PageNumberPaginator, PageStream, Paginator,
};
use crate::retry::{Cancellation, HttpClassifier, RetryController, RetryPolicy};
use crate::source::{JsonApiSource, SignalPaths, SourceConfig};
use crate::template::{self, TemplateContext};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-run options on top of a definition
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Cursor to start from, overrides the definition's
    pub cursor: Option<Cursor>,
    /// Stop after this many url and queue messages
    pub limit: Option<u64>,
    /// Token cache shared with other runs
    pub cache: Arc<TokenCache>,
    /// Interrupts backoff sleeps of the run
    pub cancel: Cancellation,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: None,
            cache: TokenCache::global(),
            cancel: Cancellation::new(),
        }
    }
}

/// Named groups of `url` matched against the definition's pattern
///
/// Definitions without a pattern accept any URL and yield no groups.
pub fn match_url(def: &ExtractorDefinition, url: &str) -> Result<Value> {
    let Some(ref pattern) = def.pattern else {
        return Ok(Value::Object(Map::new()));
    };
    let regex = Regex::new(pattern).map_err(|e| Error::config(format!("Invalid pattern: {e}")))?;
    let captures = regex.captures(url).ok_or_else(|| {
        Error::config(format!("URL '{url}' does not match extractor '{}'", def.name))
    })?;

    let groups = regex
        .capture_names()
        .flatten()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|m| (name.to_string(), Value::String(m.as_str().to_string())))
        })
        .collect();
    Ok(Value::Object(groups))
}

/// Build the driver of one run
pub fn build_driver(
    def: &ExtractorDefinition,
    ctx: &TemplateContext,
    options: &RunOptions,
) -> Result<Driver<JsonApiSource>> {
    let mut client = HttpClient::with_config(build_http_config(&def.root, &def.http))?;

    let authenticator = match def.auth {
        Some(ref auth) => build_authenticator(auth, ctx, options.cache.clone())?,
        None => None,
    };
    if let Some(ref auth) = authenticator {
        client = client.with_authenticator(auth.clone());
    }

    let paginator = build_paginator(&def.pagination);
    let mut source = JsonApiSource::new(
        build_source_config(def, ctx)?,
        Arc::new(client),
        paginator.clone(),
    )
    .with_classifier(Arc::new(build_classifier(&def.retry)?));
    if let Some(auth) = authenticator {
        source = source.with_authenticator(auth);
    }

    let controller =
        RetryController::new(build_policy(&def.retry)).with_cancellation(options.cancel.clone());
    let mut stream = PageStream::new(source, paginator)
        .with_controller(Arc::new(controller))
        .with_dedup(def.dedup);

    let cursor = match (&options.cursor, &def.cursor) {
        (Some(cursor), _) => Some(cursor.clone()),
        (None, Some(cursor)) => Some(cursor.parse()?),
        (None, None) => None,
    };
    if let Some(cursor) = cursor {
        stream = stream.starting_at(cursor);
    }

    let mut groups = JsonGroups::new(&def.emit.url);
    groups.files_path.clone_from(&def.emit.files);
    for (name, path) in &def.emit.directory {
        groups = groups.field(name, path);
    }

    let mut config = DriverConfig::new();
    config.limit = options.limit;
    config.queue_extractor.clone_from(&def.emit.queue);

    debug!("Built extractor '{}'", def.name);
    Ok(Driver::new(stream, groups, &def.root)?.with_config(config))
}

/// Build HTTP client config
pub fn build_http_config(root: &str, http: &HttpDefinition) -> HttpClientConfig {
    let mut builder = HttpClientConfig::builder()
        .base_url(root)
        .timeout(Duration::from_secs(http.timeout_secs));

    builder = match (http.interval_ms, http.rate_limit_rps) {
        (Some(ms), _) => builder.rate_limit(RateLimiterConfig::every(Duration::from_millis(ms))),
        (None, Some(rps)) => builder.rate_limit(RateLimiterConfig::per_second(rps)),
        (None, None) => builder.no_rate_limit(),
    };

    if let Some(ref agent) = http.user_agent {
        builder = builder.user_agent(agent);
    }
    for (key, value) in &http.headers {
        builder = builder.header(key, value);
    }

    builder.build()
}

/// Build the retry policy
pub fn build_policy(retry: &RetryDefinition) -> RetryPolicy {
    RetryPolicy::new()
        .with_max_retries(retry.max_retries)
        .with_backoff(
            retry.backoff,
            Duration::from_millis(retry.initial_backoff_ms),
            Duration::from_millis(retry.max_backoff_ms),
        )
}

/// Build the response classifier
pub fn build_classifier(retry: &RetryDefinition) -> Result<HttpClassifier> {
    let mut classifier = HttpClassifier::new();
    if let Some(secs) = retry.rate_limit_wait_secs {
        classifier = classifier.rate_limit_wait(Duration::from_secs(secs));
    }
    if let Some(ref risk) = retry.risk_control {
        let pattern = Regex::new(&risk.pattern)
            .map_err(|e| Error::config(format!("Invalid risk control pattern: {e}")))?;
        classifier = classifier.risk_control(pattern, Duration::from_secs(risk.wait_secs));
    }
    if let Some(ref statuses) = retry.auth_statuses {
        classifier = classifier.auth_statuses(statuses.clone());
    }
    if let Some(ref path) = retry.error_path {
        classifier = classifier.error_path(path);
    }
    if let Some(threshold) = retry.remaining_threshold {
        classifier = classifier.remaining_threshold(threshold);
    }
    Ok(classifier)
}

/// Build paginator from definition
pub fn build_paginator(def: &PaginationDefinition) -> Arc<dyn Paginator> {
    match def {
        PaginationDefinition::None => Arc::new(NoPaginator),
        PaginationDefinition::Offset {
            param,
            limit,
            limit_param,
        } => {
            let mut paginator = OffsetPaginator::new(param, *limit);
            if let Some(limit_param) = limit_param {
                paginator = paginator.with_limit_param(limit_param);
            }
            Arc::new(paginator)
        }
        PaginationDefinition::PageNumber {
            param,
            start_page,
            page_size_param,
            page_size,
        } => {
            let mut paginator = PageNumberPaginator::new(param, *start_page);
            if let (Some(size_param), Some(size)) = (page_size_param, page_size) {
                paginator = paginator.with_page_size(size_param, *size);
            }
            Arc::new(paginator)
        }
        PaginationDefinition::Cursor {
            param,
            limit_param,
            limit,
        } => {
            let mut paginator = CursorPaginator::new(param);
            if let (Some(limit_param), Some(limit)) = (limit_param, limit) {
                paginator = paginator.with_limit(limit_param, *limit);
            }
            Arc::new(paginator)
        }
        PaginationDefinition::NextUrl => Arc::new(NextUrlPaginator::new()),
        PaginationDefinition::Keyset {
            param,
            limit_param,
            limit,
        } => {
            let mut paginator = KeysetPaginator::new(param);
            if let (Some(limit_param), Some(limit)) = (limit_param, limit) {
                paginator = paginator.with_limit(limit_param, *limit);
            }
            Arc::new(paginator)
        }
    }
}

/// Render the source definition into a source config
pub fn build_source_config(def: &ExtractorDefinition, ctx: &TemplateContext) -> Result<SourceConfig> {
    let source = &def.source;
    let path = template::render(&source.path, ctx)?;
    let url = url::Url::parse(&def.root)?.join(&path)?;

    let signal = &source.signal;
    Ok(SourceConfig {
        url: url.to_string(),
        method: source.method,
        params: render_map(&source.params, ctx)?,
        headers: render_map(&source.headers, ctx)?,
        body: source
            .body
            .as_ref()
            .map(|body| template::render_value(body, ctx))
            .transpose()?,
        records_path: source.records_path.clone(),
        id_path: source.id_path.clone(),
        signal: SignalPaths {
            next_token: signal.next_token.clone(),
            next_url: signal.next_url.clone(),
            link_rel: signal.link_rel.clone(),
            has_more: signal.has_more.clone(),
            total: signal.total.clone(),
            last_id: signal.last_id.clone(),
        },
    })
}

/// Build the authenticator, `None` for unauthenticated definitions
pub fn build_authenticator(
    def: &AuthDefinition,
    ctx: &TemplateContext,
    cache: Arc<TokenCache>,
) -> Result<Option<Arc<Authenticator>>> {
    let config = build_auth_config(&def.kind, ctx)?;
    if matches!(config, AuthConfig::None) {
        return Ok(None);
    }

    let mut authenticator = Authenticator::with_cache(config, cache);
    if let Some(secs) = def.max_age_secs {
        authenticator = authenticator.with_max_age(Duration::from_secs(secs));
    }
    Ok(Some(Arc::new(authenticator)))
}

/// Convert an auth definition (from YAML) to AuthConfig (runtime)
pub fn build_auth_config(kind: &AuthKind, ctx: &TemplateContext) -> Result<AuthConfig> {
    let render = |s: &str| template::render(s, ctx);

    Ok(match kind {
        AuthKind::None => AuthConfig::None,
        AuthKind::ApiKey {
            name,
            value,
            location,
            prefix,
        } => AuthConfig::ApiKey {
            location: *location,
            name: name.clone(),
            prefix: prefix.clone(),
            value: render(value)?,
        },
        AuthKind::Bearer { token } => AuthConfig::Bearer {
            token: render(token)?,
        },
        AuthKind::Basic { username, password } => AuthConfig::Basic {
            username: render(username)?,
            password: render(password)?,
        },
        AuthKind::Session {
            login_url,
            body,
            form,
            token_path,
            header,
            prefix,
            expires_in_path,
        } => AuthConfig::Session {
            login_url: render(login_url)?,
            login_body: render_map(body, ctx)?,
            form: *form,
            token_path: token_path.clone(),
            token_header: header.clone(),
            token_prefix: prefix.clone(),
            expires_in_path: expires_in_path.clone(),
        },
        AuthKind::OAuth2ClientCredentials {
            token_url,
            client_id,
            client_secret,
            scopes,
        } => AuthConfig::Oauth2ClientCredentials {
            token_url: render(token_url)?,
            client_id: render(client_id)?,
            client_secret: render(client_secret)?,
            scopes: scopes.clone(),
        },
        AuthKind::OAuth2Refresh {
            token_url,
            client_id,
            client_secret,
            refresh_token,
        } => AuthConfig::Oauth2Refresh {
            token_url: render(token_url)?,
            client_id: render(client_id)?,
            client_secret: render(client_secret)?,
            refresh_token: render(refresh_token)?,
        },
    })
}

fn render_map(
    map: &HashMap<String, String>,
    ctx: &TemplateContext,
) -> Result<HashMap<String, String>> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), template::render(v, ctx)?)))
        .collect()
}
