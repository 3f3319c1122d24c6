//! YAML Loader module
//!
//! Parse extractor definitions from YAML files and turn them into runs.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ExtractorDefinition` - Declarative extractor description
//! - YAML parsing with validation
//! - `build_driver` - Assembles client, source, page stream and driver
//!
//! Credentials never live in the YAML; definitions reference them through
//! `{{ config.* }}` placeholders rendered at build time.

mod build;
mod parser;
mod types;

pub use build::{
    build_auth_config, build_authenticator, build_classifier, build_driver, build_http_config,
    build_paginator, build_policy, build_source_config, match_url, RunOptions,
};
pub use parser::{load_definition, load_definition_from_str, validate_definition};
pub use types::{
    AuthDefinition, AuthKind, EmitDefinition, ExtractorDefinition, HttpDefinition,
    PaginationDefinition, RetryDefinition, RiskControlDefinition, SignalDefinition,
    SourceDefinition,
};

#[cfg(test)]
mod tests;
