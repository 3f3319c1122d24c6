//! YAML parser for extractor definitions
//!
//! Parses and validates extractor YAML files.

use crate::error::{Error, Result};
use crate::loader::types::{ExtractorDefinition, PaginationDefinition};
use crate::pagination::Cursor;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Load an extractor definition from a YAML file
pub fn load_definition(path: impl AsRef<Path>) -> Result<ExtractorDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read extractor file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_definition_from_str(&content)
}

/// Load an extractor definition from a YAML string
pub fn load_definition_from_str(yaml: &str) -> Result<ExtractorDefinition> {
    let def: ExtractorDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse extractor YAML: {e}")))?;

    validate_definition(&def)?;
    Ok(def)
}

/// Validate an extractor definition
pub fn validate_definition(def: &ExtractorDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Extractor name cannot be empty"));
    }

    let root = url::Url::parse(&def.root).map_err(|e| invalid("root", e))?;
    if !matches!(root.scheme(), "http" | "https") {
        return Err(invalid("root", "must be an http(s) URL"));
    }

    if let Some(ref pattern) = def.pattern {
        Regex::new(pattern).map_err(|e| invalid("pattern", e))?;
    }
    if let Some(ref risk) = def.retry.risk_control {
        Regex::new(&risk.pattern).map_err(|e| invalid("retry.risk_control.pattern", e))?;
    }
    if def.retry.initial_backoff_ms > def.retry.max_backoff_ms {
        return Err(invalid(
            "retry.initial_backoff_ms",
            "must not exceed retry.max_backoff_ms",
        ));
    }

    if def.source.path.trim().is_empty() {
        return Err(Error::missing_field("source.path"));
    }
    if def.emit.url.trim().is_empty() {
        return Err(Error::missing_field("emit.url"));
    }
    if let Some(ref queue) = def.emit.queue {
        if queue.trim().is_empty() {
            return Err(invalid("emit.queue", "extractor name cannot be empty"));
        }
    }

    validate_pagination(def)?;

    if let Some(ref cursor) = def.cursor {
        cursor.parse::<Cursor>()?;
    }

    Ok(())
}

/// Check that the pagination scheme has the signals it depends on
fn validate_pagination(def: &ExtractorDefinition) -> Result<()> {
    let signal = &def.source.signal;
    match &def.pagination {
        PaginationDefinition::None => {}
        PaginationDefinition::Offset { param, limit, .. } => {
            require_param("pagination.param", param)?;
            if *limit == 0 {
                return Err(invalid("pagination.limit", "must be greater than 0"));
            }
        }
        PaginationDefinition::PageNumber {
            param, page_size, ..
        } => {
            require_param("pagination.param", param)?;
            if *page_size == Some(0) {
                return Err(invalid("pagination.page_size", "must be greater than 0"));
            }
        }
        PaginationDefinition::Cursor { param, .. } => {
            require_param("pagination.param", param)?;
            if signal.next_token.is_none() {
                return Err(Error::missing_field("source.signal.next_token"));
            }
        }
        PaginationDefinition::NextUrl => {
            if signal.next_url.is_none() && signal.link_rel.is_none() {
                return Err(Error::missing_field(
                    "source.signal.next_url or source.signal.link_rel",
                ));
            }
        }
        PaginationDefinition::Keyset { param, .. } => {
            require_param("pagination.param", param)?;
            if def.source.id_path.is_none() && signal.last_id.is_none() {
                return Err(Error::missing_field(
                    "source.id_path or source.signal.last_id",
                ));
            }
        }
    }
    Ok(())
}

fn require_param(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::missing_field(field));
    }
    Ok(())
}

fn invalid(field: &str, message: impl std::fmt::Display) -> Error {
    Error::InvalidConfigValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}
