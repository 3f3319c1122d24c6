//! # extractkit
//!
//! A Rust-native engine for paginated media extractors.
//!
//! ## Features
//!
//! - **Lazy pagination**: Token, offset, page number, next URL and keyset
//!   schemes behind one item stream with resumable cursors
//! - **Backoff**: Retry-After, reset-timestamp and site-specific waits,
//!   exponential backoff for transient failures
//! - **Token caching**: Login results shared across extractors, refreshed
//!   once on expiry
//! - **YAML definitions**: Describe an extractor declaratively, credentials
//!   come from `{{ config.* }}` placeholders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use extractkit::loader::{build_driver, load_definition, RunOptions};
//! use extractkit::template::TemplateContext;
//! use extractkit::extractor::Message;
//!
//! #[tokio::main]
//! async fn main() -> extractkit::Result<()> {
//!     let def = load_definition("extractors/gallery.yaml")?;
//!     let ctx = TemplateContext::with_config(serde_json::json!({ "token": "..." }));
//!
//!     let mut driver = build_driver(&def, &ctx, &RunOptions::default())?;
//!     let mut messages: Vec<Message> = Vec::new();
//!     let summary = driver.run(&mut messages).await?;
//!
//!     if let Some(cursor) = summary.cursor {
//!         println!("continue with --cursor {cursor}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Extractor Driver                         │
//! │   groups → Directory, Url, Queue messages → Sink                │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Page Stream                            │
//! │   cursor → page → items, termination rules, resume cursor       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬──────────────────────────┐
//! │   Auth   │   HTTP    │   Paginate    │   Retry                  │
//! ├──────────┼───────────┼───────────────┼──────────────────────────┤
//! │ API Key  │ GET/POST  │ Token         │ Classify response        │
//! │ OAuth2   │ Rate Limit│ Offset        │ Retry-After / reset      │
//! │ Session  │ Link hdr  │ Page Number   │ Exponential backoff      │
//! │ Cache    │           │ Next URL      │ Refresh once on 401      │
//! └──────────┴───────────┴───────────────┴──────────────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

/// Error types and retry dispositions
pub mod error;

/// Common types and type aliases
pub mod types;

/// JSON path lookup
pub mod jsonpath;

/// Authentication and token caching
pub mod auth;

/// HTTP client with rate limiting
pub mod http;

/// Retry/backoff controller
pub mod retry;

/// Pagination strategies and the page stream
pub mod pagination;

/// Item sources
pub mod source;

/// Extractor driver and messages
pub mod extractor;

/// YAML loader for extractor definitions
pub mod loader;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

pub use error::{Error, Result};
pub use types::*;

pub use loader::{load_definition, load_definition_from_str, ExtractorDefinition};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
