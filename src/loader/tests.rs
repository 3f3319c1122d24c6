//! Tests for YAML loader module

use super::*;
use crate::auth::{AuthConfig, Location};
use crate::error::Error;
use crate::pagination::{Cursor, DedupPolicy, PageSignal, PaginationState, Paginator};
use crate::template::TemplateContext;
use crate::types::{BackoffType, Method};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use test_case::test_case;

const MINIMAL: &str = r#"
name: example
root: https://example.com
source:
  path: /api/posts
emit:
  url: file_url
"#;

fn with(extra: &str) -> String {
    format!("{MINIMAL}{extra}")
}

// ============================================================================
// Basic Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_definition() {
    let def = load_definition_from_str(MINIMAL).unwrap();

    assert_eq!(def.name, "example");
    assert_eq!(def.root, "https://example.com");
    assert_eq!(def.source.path, "/api/posts");
    assert_eq!(def.source.method, Method::GET);
    assert_eq!(def.emit.url, "file_url");
    assert!(def.auth.is_none());
    assert!(matches!(def.pagination, PaginationDefinition::None));
    assert_eq!(def.dedup, DedupPolicy::Off);
    assert_eq!(def.http.timeout_secs, 30);
    assert_eq!(def.retry.max_retries, 4);
    assert_eq!(def.retry.backoff, BackoffType::Exponential);
}

#[test]
fn test_load_definition_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let def = load_definition(file.path()).unwrap();
    assert_eq!(def.name, "example");
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_definition(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}

#[test]
fn test_load_full_definition() {
    let yaml = r#"
name: gallery
pattern: 'https?://example\.com/user/(?P<user>[\w-]+)'
root: https://example.com
http:
  timeout_secs: 10
  interval_ms: 1500
  user_agent: test-agent/1.0
  headers:
    Referer: https://example.com/
retry:
  max_retries: 6
  backoff: linear
  initial_backoff_ms: 500
  max_backoff_ms: 8000
  rate_limit_wait_secs: 120
  risk_control:
    pattern: "slow down"
  auth_statuses: [401, 403]
  error_path: error
  remaining_threshold: 2
auth:
  type: session
  login_url: https://example.com/api/login
  body:
    username: "{{ config.username }}"
    password: "{{ config.password }}"
  token_path: $.data.token
  prefix: "Bearer "
  max_age_secs: 3600
source:
  path: "/api/users/{{ match.user }}/posts"
  params:
    sort: new
  records_path: $.data.posts
  id_path: id
  signal:
    next_token: $.data.cursor
    total: $.data.total
pagination:
  type: cursor
  param: cursor
  limit_param: limit
  limit: 50
emit:
  url: url
  files: attachments
  directory:
    post_id: id
    title: title
dedup: drop_seen
cursor: "token:abc"
"#;

    let def = load_definition_from_str(yaml).unwrap();

    assert_eq!(def.http.interval_ms, Some(1500));
    assert_eq!(
        def.http.headers.get("Referer").map(String::as_str),
        Some("https://example.com/")
    );
    assert_eq!(def.retry.backoff, BackoffType::Linear);
    assert_eq!(def.retry.risk_control.as_ref().unwrap().wait_secs, 300);
    assert_eq!(def.retry.auth_statuses, Some(vec![401, 403]));

    let auth = def.auth.as_ref().unwrap();
    assert_eq!(auth.max_age_secs, Some(3600));
    match &auth.kind {
        AuthKind::Session {
            header,
            form,
            prefix,
            ..
        } => {
            assert_eq!(header, "Authorization");
            assert!(!form);
            assert_eq!(prefix.as_deref(), Some("Bearer "));
        }
        other => panic!("Expected session auth, got {other:?}"),
    }

    assert!(matches!(
        def.pagination,
        PaginationDefinition::Cursor { limit: Some(50), .. }
    ));
    assert_eq!(def.emit.files.as_deref(), Some("attachments"));
    assert_eq!(def.emit.directory.len(), 2);
    assert_eq!(def.dedup, DedupPolicy::DropSeen);
    assert_eq!(def.cursor.as_deref(), Some("token:abc"));
}

// ============================================================================
// Auth Definition Tests
// ============================================================================

#[test]
fn test_load_api_key_auth() {
    let yaml = with(
        r#"
auth:
  type: api_key
  name: api_key
  value: "{{ config.api_key }}"
  location: query
"#,
    );

    let def = load_definition_from_str(&yaml).unwrap();
    match def.auth.unwrap().kind {
        AuthKind::ApiKey {
            name,
            value,
            location,
            prefix,
        } => {
            assert_eq!(name, "api_key");
            assert_eq!(value, "{{ config.api_key }}");
            assert_eq!(location, Location::Query);
            assert_eq!(prefix, None);
        }
        other => panic!("Expected ApiKey auth, got {other:?}"),
    }
}

#[test]
fn test_load_oauth2_refresh_auth() {
    let yaml = with(
        r#"
auth:
  type: oauth2_refresh
  token_url: https://example.com/oauth/token
  client_id: "{{ config.client_id }}"
  refresh_token: "{{ config.refresh_token }}"
"#,
    );

    let def = load_definition_from_str(&yaml).unwrap();
    match def.auth.unwrap().kind {
        AuthKind::OAuth2Refresh { client_secret, .. } => assert_eq!(client_secret, ""),
        other => panic!("Expected refresh auth, got {other:?}"),
    }
}

#[test]
fn test_build_auth_config_renders_templates() {
    let ctx = TemplateContext::with_config(json!({"username": "kim", "password": "hunter2"}));
    let kind = AuthKind::Basic {
        username: "{{ config.username }}".to_string(),
        password: "{{ config.password }}".to_string(),
    };

    match build_auth_config(&kind, &ctx).unwrap() {
        AuthConfig::Basic { username, password } => {
            assert_eq!(username, "kim");
            assert_eq!(password, "hunter2");
        }
        other => panic!("unexpected config: {other:?}"),
    }
}

#[test]
fn test_build_auth_config_missing_credential() {
    let kind = AuthKind::Bearer {
        token: "{{ config.token }}".to_string(),
    };
    let err = build_auth_config(&kind, &TemplateContext::new()).unwrap_err();
    assert!(matches!(err, Error::UndefinedVariable { .. }));
}

#[test]
fn test_build_authenticator_none_is_absent() {
    let def = AuthDefinition {
        kind: AuthKind::None,
        max_age_secs: None,
    };
    let cache = std::sync::Arc::new(crate::auth::TokenCache::default());
    assert!(build_authenticator(&def, &TemplateContext::new(), cache)
        .unwrap()
        .is_none());
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test_case("name: \"\"\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}" ; "empty name")]
#[test_case("name: x\nroot: not-a-url\nsource: {path: /a}\nemit: {url: u}" ; "invalid root")]
#[test_case("name: x\nroot: ftp://example.com\nsource: {path: /a}\nemit: {url: u}" ; "non http root")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: \"\"}\nemit: {url: u}" ; "empty path")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: \"\"}" ; "empty url path")]
#[test_case("name: x\npattern: '('\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}" ; "bad pattern")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\ncursor: 'offset:-1'" ; "bad cursor")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\npagination: {type: offset, param: o, limit: 0}" ; "zero limit")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\npagination: {type: cursor, param: c}" ; "cursor without token path")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\npagination: {type: next_url}" ; "next url without signal")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\npagination: {type: keyset, param: max_id}" ; "keyset without ids")]
#[test_case("name: x\nroot: https://example.com\nsource: {path: /a}\nemit: {url: u}\nretry: {initial_backoff_ms: 5000, max_backoff_ms: 10}" ; "backoff bounds")]
fn test_invalid_definitions(yaml: &str) {
    assert!(load_definition_from_str(yaml).is_err());
}

#[test]
fn test_unparseable_yaml() {
    let err = load_definition_from_str("name: [unclosed").unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[test]
fn test_next_url_accepts_link_header() {
    let yaml = with(
        r#"
pagination:
  type: next_url
"#,
    )
    .replace(
        "  path: /api/posts\n",
        "  path: /api/posts\n  signal:\n    link_rel: next\n",
    );

    let def = load_definition_from_str(&yaml).unwrap();
    assert!(matches!(def.pagination, PaginationDefinition::NextUrl));
    assert_eq!(def.source.signal.link_rel.as_deref(), Some("next"));
}

// ============================================================================
// Build Tests
// ============================================================================

#[test]
fn test_build_paginators() {
    let state = PaginationState::new(Cursor::Offset(40));

    let offset = build_paginator(&PaginationDefinition::Offset {
        param: "o".to_string(),
        limit: 20,
        limit_param: Some("n".to_string()),
    });
    assert_eq!(offset.initial_cursor(), Cursor::Offset(0));
    assert_eq!(offset.per_page(), Some(20));
    let params = offset.request_params(&Cursor::Offset(40));
    assert_eq!(params.get("o").map(String::as_str), Some("40"));
    assert_eq!(params.get("n").map(String::as_str), Some("20"));

    let none = build_paginator(&PaginationDefinition::None);
    assert!(none
        .next_cursor(&state, &PageSignal::new().next_token("x"), 5)
        .is_done());

    let pages = build_paginator(&PaginationDefinition::PageNumber {
        param: "p".to_string(),
        start_page: 1,
        page_size_param: None,
        page_size: None,
    });
    assert_eq!(pages.initial_cursor(), Cursor::Page(1));
}

#[test]
fn test_build_http_config() {
    let http = HttpDefinition {
        timeout_secs: 5,
        interval_ms: Some(2000),
        rate_limit_rps: Some(50),
        user_agent: Some("agent/1".to_string()),
        ..HttpDefinition::default()
    };

    let config = build_http_config("https://example.com", &http);
    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.rate_limit.unwrap().period, Duration::from_secs(2));
    assert_eq!(config.user_agent, "agent/1");
    assert_eq!(config.base_url.as_deref(), Some("https://example.com"));

    let config = build_http_config("https://example.com", &HttpDefinition::default());
    assert!(config.rate_limit.is_none());
}

#[test]
fn test_build_policy() {
    let retry = RetryDefinition {
        max_retries: 2,
        backoff: BackoffType::Constant,
        initial_backoff_ms: 250,
        ..RetryDefinition::default()
    };

    let policy = build_policy(&retry);
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.backoff(3), Duration::from_millis(250));
}

#[test]
fn test_build_classifier_rejects_bad_pattern() {
    let retry = RetryDefinition {
        risk_control: Some(RiskControlDefinition {
            pattern: "(".to_string(),
            wait_secs: 1,
        }),
        ..RetryDefinition::default()
    };
    assert!(build_classifier(&retry).is_err());
}

#[test]
fn test_build_source_config_renders_path() {
    let yaml = r#"
name: users
pattern: 'https?://example\.com/(?P<user>\w+)'
root: https://example.com/
source:
  path: "api/{{ match.user }}/posts"
  params:
    key: "{{ config.key }}"
  body:
    limit: "{{ config.limit }}"
emit:
  url: url
"#;
    let def = load_definition_from_str(yaml).unwrap();
    let matched = match_url(&def, "https://example.com/kim").unwrap();
    let ctx = TemplateContext::with_config(json!({"key": "k1", "limit": 25})).with_match(matched);

    let config = build_source_config(&def, &ctx).unwrap();
    assert_eq!(config.url, "https://example.com/api/kim/posts");
    assert_eq!(config.params.get("key").map(String::as_str), Some("k1"));
    assert_eq!(config.body, Some(json!({"limit": 25})));
}

#[test]
fn test_match_url() {
    let yaml = with("pattern: 'https?://example\\.com/user/(?P<user>\\w+)(?:/(?P<tab>\\w+))?'\n");
    let def = load_definition_from_str(&yaml).unwrap();

    assert_eq!(
        match_url(&def, "https://example.com/user/kim").unwrap(),
        json!({"user": "kim"})
    );
    assert_eq!(
        match_url(&def, "https://example.com/user/kim/likes").unwrap(),
        json!({"user": "kim", "tab": "likes"})
    );
    assert!(match_url(&def, "https://other.org/user/kim").is_err());

    let any = load_definition_from_str(MINIMAL).unwrap();
    assert_eq!(match_url(&any, "whatever").unwrap(), json!({}));
}

#[test]
fn test_build_driver_applies_cursor_and_limit() {
    let yaml = with("cursor: \"page:3\"\npagination:\n  type: page_number\n  param: p\n");
    let def = load_definition_from_str(&yaml).unwrap();

    let driver = build_driver(&def, &TemplateContext::new(), &RunOptions::default()).unwrap();
    assert_eq!(driver.stream().cursor(), &Cursor::Page(3));

    let options = RunOptions {
        cursor: Some(Cursor::Page(7)),
        limit: Some(10),
        ..RunOptions::default()
    };
    let driver = build_driver(&def, &TemplateContext::new(), &options).unwrap();
    assert_eq!(driver.stream().cursor(), &Cursor::Page(7));
}
