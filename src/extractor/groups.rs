//! Group extraction
//!
//! Splits one item of the page stream (a post, a gallery, an album) into
//! group metadata and the entries to download.

use crate::error::{Error, Result};
use crate::jsonpath;
use crate::types::Metadata;
use serde_json::Value;
use std::collections::BTreeMap;

/// One downloadable entry of a group
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// URL as found in the item, possibly relative
    pub url: String,
    /// Item-level fields
    pub metadata: Metadata,
}

impl Entry {
    /// Create an entry
    pub fn new(url: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            url: url.into(),
            metadata,
        }
    }
}

/// Site-specific view of a group item
pub trait GroupExtractor<I>: Send + Sync {
    /// Group-level metadata
    fn metadata(&self, item: &I) -> Result<Metadata>;

    /// Entries of the group in source order
    fn entries(&self, item: &I) -> Result<Vec<Entry>>;
}

/// Group extractor for JSON items, driven by paths
#[derive(Debug, Clone)]
pub struct JsonGroups {
    /// Output name to path of the group fields, all scalar fields when empty
    pub directory: BTreeMap<String, String>,
    /// Path of the entry array inside an item, the item itself when `None`
    pub files_path: Option<String>,
    /// Path of the URL inside an entry
    pub url_path: String,
}

impl JsonGroups {
    /// Items holding a single URL at `url_path`
    pub fn new(url_path: impl Into<String>) -> Self {
        Self {
            directory: BTreeMap::new(),
            files_path: None,
            url_path: url_path.into(),
        }
    }

    /// Read entries from the array at `path`
    #[must_use]
    pub fn with_files(mut self, path: impl Into<String>) -> Self {
        self.files_path = Some(path.into());
        self
    }

    /// Add a group field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.directory.insert(name.into(), path.into());
        self
    }

    fn entry(&self, value: &Value) -> Result<Entry> {
        let url = jsonpath::extract_string(value, &self.url_path)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::extraction(format!("no URL at '{}'", self.url_path)))?;
        Ok(Entry::new(url, scalar_fields(value)))
    }
}

impl GroupExtractor<Value> for JsonGroups {
    fn metadata(&self, item: &Value) -> Result<Metadata> {
        if self.directory.is_empty() {
            return Ok(scalar_fields(item));
        }

        let mut metadata = Metadata::new();
        for (name, path) in &self.directory {
            let value = jsonpath::lookup(item, path)
                .ok_or_else(|| Error::extraction(format!("missing group field '{path}'")))?;
            metadata.insert(name.clone(), value.clone());
        }
        Ok(metadata)
    }

    fn entries(&self, item: &Value) -> Result<Vec<Entry>> {
        let Some(path) = self.files_path.as_deref() else {
            return Ok(vec![self.entry(item)?]);
        };

        match jsonpath::lookup(item, path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(files)) => files.iter().map(|file| self.entry(file)).collect(),
            Some(_) => Err(Error::RecordExtraction {
                path: path.to_string(),
                message: "expected an array of entries".to_string(),
            }),
        }
    }
}

/// Top-level fields of an object that are not objects or arrays
fn scalar_fields(value: &Value) -> Metadata {
    let Value::Object(object) = value else {
        return Metadata::new();
    };
    object
        .iter()
        .filter(|(_, v)| !v.is_object() && !v.is_array())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
