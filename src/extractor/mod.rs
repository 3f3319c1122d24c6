//! Extractor driver module
//!
//! Turns the item sequence of a page stream into directory, url and queue
//! messages.
//!
//! # Overview
//!
//! The extractor module provides:
//! - `Driver` - Pulls groups from a [`PageStream`] and emits messages to a [`Sink`]
//! - `GroupExtractor` - Site-specific split of an item into metadata and entries
//! - Message types for output (Directory, Url, Queue)
//!
//! Every group produces exactly one `Directory` message followed by its
//! `Url` (or `Queue`) messages. A group that fails to extract is logged and
//! skipped; a page that fails to load ends the run.

mod groups;
mod types;

pub use groups::{Entry, GroupExtractor, JsonGroups};
pub use types::{DriverConfig, JsonLinesSink, Message, RunStats, RunSummary, Sink};

use crate::error::{Error, Result};
use crate::pagination::PageStream;
use crate::source::ItemSource;
use crate::types::Metadata;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

/// Drives one extractor run
pub struct Driver<S: ItemSource> {
    /// Item stream, one item per group
    stream: PageStream<S>,
    /// Site-specific group view
    groups: Box<dyn GroupExtractor<S::Item>>,
    /// Base for relative URLs
    root: Url,
    /// Driver configuration
    config: DriverConfig,
    /// Statistics
    stats: RunStats,
    /// Page cursor of a group the limit cut short
    cut_cursor: Option<String>,
}

impl<S: ItemSource> Driver<S> {
    /// Create a driver resolving relative URLs against `root`
    pub fn new(
        stream: PageStream<S>,
        groups: impl GroupExtractor<S::Item> + 'static,
        root: &str,
    ) -> Result<Self> {
        Ok(Self {
            stream,
            groups: Box::new(groups),
            root: Url::parse(root)?,
            config: DriverConfig::default(),
            stats: RunStats::default(),
            cut_cursor: None,
        })
    }

    /// Set driver configuration
    #[must_use]
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Get statistics
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// The underlying page stream
    pub fn stream(&self) -> &PageStream<S> {
        &self.stream
    }

    /// Summary of the run so far
    pub fn summary(&self) -> RunSummary {
        let mut stats = self.stats.clone();
        stats.pages_fetched = self.stream.pages_fetched();
        stats.retries = self.stream.retries();
        RunSummary {
            stats,
            cursor: self
                .cut_cursor
                .clone()
                .or_else(|| self.stream.resume_token()),
            stop: self.stream.stop_reason(),
            limited: self.limit_reached(),
        }
    }

    /// Run until the stream ends, the limit is reached or a page fails
    ///
    /// On a page failure the cursor to continue from is logged and the
    /// error returned; messages already sent stay sent.
    pub async fn run(&mut self, sink: &mut dyn Sink) -> Result<RunSummary> {
        let start = Instant::now();
        let result = self.pump(sink).await;
        self.stats.duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                let summary = self.summary();
                info!(
                    "Run finished: {} groups, {} urls, {} queued in {} pages",
                    summary.stats.groups,
                    summary.stats.urls,
                    summary.stats.queued,
                    summary.stats.pages_fetched
                );
                if summary.limited {
                    if let Some(ref cursor) = summary.cursor {
                        info!("Limit reached, use cursor={cursor} to continue");
                    }
                }
                Ok(summary)
            }
            Err(err) => {
                error!("{err}");
                if let Some(cursor) = self.stream.resume_token() {
                    info!("use cursor={cursor} to continue");
                }
                Err(err)
            }
        }
    }

    async fn pump(&mut self, sink: &mut dyn Sink) -> Result<()> {
        while !self.limit_reached() {
            let Some(item) = self.stream.next_item().await? else {
                break;
            };

            let messages = match self.group_messages(&item) {
                Ok(messages) => messages,
                Err(err) => {
                    warn!("Skipping group {}: {err}", self.stats.groups + 1);
                    self.stats.skipped_groups += 1;
                    continue;
                }
            };

            self.stats.groups += 1;
            for message in messages {
                if !message.is_directory() && self.limit_reached() {
                    // the rest of this group lives on the page it came from
                    self.cut_cursor = self.stream.item_cursor().map(ToString::to_string);
                    break;
                }
                match message {
                    Message::Url { .. } => self.stats.urls += 1,
                    Message::Queue { .. } => self.stats.queued += 1,
                    Message::Directory { .. } => {}
                }
                sink.send(message)?;
            }
        }
        Ok(())
    }

    /// Every message of one group, built before any is sent
    fn group_messages(&self, item: &S::Item) -> Result<Vec<Message>> {
        let group = self.groups.metadata(item)?;
        let entries = self.groups.entries(item)?;
        debug!("Group with {} entries", entries.len());

        let mut messages = Vec::with_capacity(entries.len() + 1);
        messages.push(Message::directory(group.clone()));

        for (index, entry) in entries.into_iter().enumerate() {
            let url = self
                .root
                .join(&entry.url)
                .map_err(|e| Error::extraction(format!("invalid URL '{}': {e}", entry.url)))?;

            let mut metadata: Metadata = group.clone();
            metadata.extend(entry.metadata);
            metadata.insert("num".to_string(), Value::from(index as u64 + 1));

            messages.push(match self.config.queue_extractor {
                Some(ref extractor) => Message::queue(url, extractor.clone(), metadata),
                None => Message::url(url, metadata),
            });
        }
        Ok(messages)
    }

    fn limit_reached(&self) -> bool {
        self.config
            .limit
            .is_some_and(|limit| self.stats.emitted() >= limit)
    }
}

impl<S: ItemSource> std::fmt::Debug for Driver<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("root", &self.root.as_str())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
