//! Loader types
//!
//! Declarative extractor definition types for YAML parsing.

use crate::auth::Location;
use crate::pagination::DedupPolicy;
use crate::types::{BackoffType, Method};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// Extractor Definition
// ============================================================================

/// Top-level extractor definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractorDefinition {
    /// Extractor name
    pub name: String,
    /// Regex for input URLs, its named groups are available as `{{ match.* }}`
    #[serde(default)]
    pub pattern: Option<String>,
    /// Site root, relative URLs resolve against it
    pub root: String,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Retry and rate-limit handling
    #[serde(default)]
    pub retry: RetryDefinition,
    /// Authentication configuration
    #[serde(default)]
    pub auth: Option<AuthDefinition>,
    /// List endpoint
    pub source: SourceDefinition,
    /// Pagination scheme
    #[serde(default)]
    pub pagination: PaginationDefinition,
    /// Message emission
    pub emit: EmitDefinition,
    /// Duplicate handling
    #[serde(default)]
    pub dedup: DedupPolicy,
    /// Cursor to start from
    #[serde(default)]
    pub cursor: Option<String>,
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Rate limit (requests per second)
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,
    /// Minimum interval between requests in milliseconds
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// User agent
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Headers for every request
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            rate_limit_rps: None,
            interval_ms: None,
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Retry Definition
// ============================================================================

/// Retry and rate-limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryDefinition {
    /// Retries of one page request before giving up
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Backoff curve for temporary failures
    #[serde(default)]
    pub backoff: BackoffType,
    /// First backoff delay in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Backoff cap in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Wait for a rate limit that names no reset time
    #[serde(default)]
    pub rate_limit_wait_secs: Option<u64>,
    /// Body pattern of a "slow down" page
    #[serde(default)]
    pub risk_control: Option<RiskControlDefinition>,
    /// Statuses meaning the credentials were rejected
    #[serde(default)]
    pub auth_statuses: Option<Vec<u16>>,
    /// Path of an error flag in successful responses
    #[serde(default)]
    pub error_path: Option<String>,
    /// Wait proactively when `x-ratelimit-remaining` drops below this
    #[serde(default)]
    pub remaining_threshold: Option<f64>,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            rate_limit_wait_secs: None,
            risk_control: None,
            auth_statuses: None,
            error_path: None,
            remaining_threshold: None,
        }
    }
}

fn default_retries() -> u32 {
    4
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    60_000
}

/// "Slow down" page detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskControlDefinition {
    /// Regex matched against the response body
    pub pattern: String,
    /// Wait in seconds before retrying
    #[serde(default = "default_risk_wait")]
    pub wait_secs: u64,
}

fn default_risk_wait() -> u64 {
    300
}

// ============================================================================
// Auth Definition
// ============================================================================

/// Authentication definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthDefinition {
    /// Credential kind
    #[serde(flatten)]
    pub kind: AuthKind,
    /// How long a login stays cached, in seconds
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// Credential kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthKind {
    /// No authentication
    None,
    /// API key authentication
    ApiKey {
        /// Header or query param name
        name: String,
        /// Value (usually a template like `{{ config.api_key }}`)
        value: String,
        /// Location: header or query
        #[serde(default)]
        location: Location,
        /// Prefix before the value
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Bearer token authentication
    Bearer {
        /// Token value (template)
        token: String,
    },
    /// Basic authentication
    Basic {
        /// Username (template)
        username: String,
        /// Password (template)
        password: String,
    },
    /// Login form or endpoint returning a session token
    Session {
        /// Login URL
        login_url: String,
        /// Login fields (templates)
        body: HashMap<String, String>,
        /// Send the fields form-encoded
        #[serde(default)]
        form: bool,
        /// Path to extract token from response
        token_path: String,
        /// Header name for token
        #[serde(default = "default_token_header")]
        header: String,
        /// Header prefix (e.g., "Bearer ")
        #[serde(default)]
        prefix: Option<String>,
        /// Path of the token lifetime in seconds
        #[serde(default)]
        expires_in_path: Option<String>,
    },
    /// OAuth2 client credentials
    #[serde(rename = "oauth2_client_credentials")]
    OAuth2ClientCredentials {
        /// Token URL
        token_url: String,
        /// Client ID (template)
        client_id: String,
        /// Client secret (template)
        client_secret: String,
        /// Scopes
        #[serde(default)]
        scopes: Vec<String>,
    },
    /// OAuth2 refresh token
    #[serde(rename = "oauth2_refresh")]
    OAuth2Refresh {
        /// Token URL
        token_url: String,
        /// Client ID (template)
        client_id: String,
        /// Client secret (template)
        #[serde(default)]
        client_secret: String,
        /// Refresh token (template)
        refresh_token: String,
    },
}

fn default_token_header() -> String {
    "Authorization".to_string()
}

// ============================================================================
// Source Definition
// ============================================================================

/// List endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceDefinition {
    /// URL or path below `root` (can contain templates)
    pub path: String,
    /// HTTP method
    #[serde(default)]
    pub method: Method,
    /// Query parameters (templates)
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Request headers (templates)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// JSON body for POST endpoints (templates in strings)
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// JSON path to records array, the body itself when absent
    #[serde(default)]
    pub records_path: Option<String>,
    /// JSON path to the id inside a record
    #[serde(default)]
    pub id_path: Option<String>,
    /// Next-page information
    #[serde(default)]
    pub signal: SignalDefinition,
}

/// JSON paths of the next-page information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SignalDefinition {
    /// Continuation token
    #[serde(default)]
    pub next_token: Option<String>,
    /// Next page URL
    #[serde(default)]
    pub next_url: Option<String>,
    /// `Link` header relation
    #[serde(default)]
    pub link_rel: Option<String>,
    /// More-pages flag
    #[serde(default)]
    pub has_more: Option<String>,
    /// Total item count
    #[serde(default)]
    pub total: Option<String>,
    /// Last item id
    #[serde(default)]
    pub last_id: Option<String>,
}

// ============================================================================
// Pagination Definition
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationDefinition {
    /// Single page
    #[default]
    None,
    /// Offset-based pagination
    Offset {
        /// Offset parameter name
        param: String,
        /// Page size
        limit: u64,
        /// Limit parameter name
        #[serde(default)]
        limit_param: Option<String>,
    },
    /// Page number pagination
    PageNumber {
        /// Page parameter name
        param: String,
        /// Start page (usually 0 or 1)
        #[serde(default = "default_start_page")]
        start_page: u64,
        /// Page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size
        #[serde(default)]
        page_size: Option<u64>,
    },
    /// Cursor/token pagination
    Cursor {
        /// Cursor parameter name
        param: String,
        /// Limit parameter name
        #[serde(default)]
        limit_param: Option<String>,
        /// Page size
        #[serde(default)]
        limit: Option<u64>,
    },
    /// Follow the next URL from the body or `Link` header
    NextUrl,
    /// Keyset pagination on the last item id
    Keyset {
        /// Parameter carrying the last id
        param: String,
        /// Limit parameter name
        #[serde(default)]
        limit_param: Option<String>,
        /// Page size
        #[serde(default)]
        limit: Option<u64>,
    },
}

fn default_start_page() -> u64 {
    1
}

// ============================================================================
// Emit Definition
// ============================================================================

/// How items turn into messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmitDefinition {
    /// Path of the URL inside an entry
    pub url: String,
    /// Path of the entry array inside an item, the item itself when absent
    #[serde(default)]
    pub files: Option<String>,
    /// Group metadata: output name to path, all scalar fields when empty
    #[serde(default)]
    pub directory: BTreeMap<String, String>,
    /// Emit queue messages for this extractor instead of urls
    #[serde(default)]
    pub queue: Option<String>,
}
