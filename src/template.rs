//! Template interpolation for extractor definitions
//!
//! Handles `{{ variable }}` interpolation in definition strings.
//! Supports nested access like `{{ config.api_key }}` and `{{ match.user }}`,
//! where `match` holds the named groups of the extractor's URL pattern.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template pattern is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// User configuration (credentials, options)
    pub config: Value,
    /// Named groups of the matched input URL
    pub matched: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with config values
    pub fn with_config(config: Value) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Set URL match groups
    #[must_use]
    pub fn with_match(mut self, matched: Value) -> Self {
        self.matched = matched;
        self
    }

    /// Get a value by path (e.g., "config.api_key")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();
        let (root, rest) = match parts.split_first()? {
            (&"config", rest) => (&self.config, rest),
            (&"match", rest) => (&self.matched, rest),
            // Bare names refer to config fields
            _ => (&self.config, parts.as_slice()),
        };
        get_nested_value(root, rest).filter(|value| !value.is_null())
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, part| match current {
        Value::Object(map) => map.get(*part),
        _ => None,
    })
}

fn variable<'c>(cap: &'c Captures<'_>) -> &'c str {
    cap.get(1).map_or("", |m| m.as_str())
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &Captures<'_>| {
        let path = variable(cap);
        match ctx.get(path) {
            Some(value) => value_to_string(value),
            None => {
                missing.push(path.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| variable(&cap).to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

/// Render all string values in a JSON value
///
/// A string that is exactly one placeholder keeps the type of the
/// referenced value, so `"{{ config.limit }}"` can yield a number.
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => {
            if let Some(cap) = TEMPLATE_REGEX.captures(s) {
                if cap.get(0).is_some_and(|m| m.as_str() == s.trim()) {
                    let path = variable(&cap);
                    return ctx
                        .get(path)
                        .cloned()
                        .ok_or_else(|| Error::undefined_var(path));
                }
            }
            Ok(Value::String(render(s, ctx)?))
        }
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), render_value(v, ctx)?)))
            .collect::<Result<serde_json::Map<_, _>>>()
            .map(Value::Object),
        Value::Array(arr) => arr
            .iter()
            .map(|v| render_value(v, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}
