//! Extractor types
//!
//! Message types, sinks and run statistics for the extractor driver.

use crate::error::Result;
use crate::pagination::StopReason;
use crate::types::Metadata;
use serde::Serialize;
use std::io::Write;

/// A message emitted by an extractor run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Metadata of a group, sent once before its urls
    Directory {
        /// Group metadata
        metadata: Metadata,
    },
    /// A downloadable resource
    Url {
        /// Absolute URL
        url: String,
        /// Group metadata merged with item fields and `num`
        metadata: Metadata,
    },
    /// A pointer for another extractor to follow
    Queue {
        /// Absolute URL
        url: String,
        /// Name of the extractor that handles `url`
        extractor: String,
        /// Group metadata merged with item fields and `num`
        metadata: Metadata,
    },
}

impl Message {
    /// Create a directory message
    pub fn directory(metadata: Metadata) -> Self {
        Self::Directory { metadata }
    }

    /// Create a url message
    pub fn url(url: impl Into<String>, metadata: Metadata) -> Self {
        Self::Url {
            url: url.into(),
            metadata,
        }
    }

    /// Create a queue message
    pub fn queue(url: impl Into<String>, extractor: impl Into<String>, metadata: Metadata) -> Self {
        Self::Queue {
            url: url.into(),
            extractor: extractor.into(),
            metadata,
        }
    }

    /// Check if this is a directory message
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    /// Check if this is a url message
    pub fn is_url(&self) -> bool {
        matches!(self, Self::Url { .. })
    }

    /// Check if this is a queue message
    pub fn is_queue(&self) -> bool {
        matches!(self, Self::Queue { .. })
    }

    /// Metadata carried by the message
    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Directory { metadata }
            | Self::Url { metadata, .. }
            | Self::Queue { metadata, .. } => metadata,
        }
    }
}

/// Receiver of extractor messages
pub trait Sink: Send {
    /// Accept one message
    fn send(&mut self, message: Message) -> Result<()>;
}

impl Sink for Vec<Message> {
    fn send(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// Writes each message as one JSON line
#[derive(Debug)]
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Create a sink writing to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for JsonLinesSink<W> {
    fn send(&mut self, message: Message) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &message)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Driver configuration
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Stop after this many url and queue messages
    pub limit: Option<u64>,
    /// Name of the extractor handling queued urls, `None` for url messages
    pub queue_extractor: Option<String>,
}

impl DriverConfig {
    /// Create a new driver config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the emission limit
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Emit queue messages for `extractor` instead of url messages
    #[must_use]
    pub fn with_queue(mut self, extractor: impl Into<String>) -> Self {
        self.queue_extractor = Some(extractor.into());
        self
    }
}

/// Statistics from an extractor run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Pages fetched
    pub pages_fetched: u64,
    /// Groups emitted
    pub groups: u64,
    /// Url messages emitted
    pub urls: u64,
    /// Queue messages emitted
    pub queued: u64,
    /// Groups skipped after an error
    pub skipped_groups: u64,
    /// Page requests repeated by the retry controller
    pub retries: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Url and queue messages emitted
    pub fn emitted(&self) -> u64 {
        self.urls + self.queued
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Statistics
    pub stats: RunStats,
    /// Cursor to continue from, `None` when everything was delivered
    pub cursor: Option<String>,
    /// Why pagination stopped, `None` when the run ended early
    pub stop: Option<StopReason>,
    /// Whether the emission limit ended the run
    pub limited: bool,
}
