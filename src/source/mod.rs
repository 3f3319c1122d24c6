//! Item sources
//!
//! An item source knows how to fetch one page of one site. The pagination
//! engine drives it through [`ItemSource::fetch_page`] and never looks at
//! transport details.
//!
//! # Overview
//!
//! - [`ItemSource`] - the capability trait, one implementation per site
//! - [`PageRequest`] - cursor plus attempt number of a page fetch
//! - [`JsonApiSource`] - a configurable source for JSON APIs, built from a
//!   [`SourceConfig`]

mod json;

pub use json::{JsonApiSource, SignalPaths, SourceConfig};

use crate::error::{Error, Result};
use crate::pagination::{Cursor, Page};
use async_trait::async_trait;
use std::sync::Arc;

/// One page fetch as seen by an item source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Position of the page
    pub cursor: Cursor,
    /// Pages fetched before this one in the run
    pub page_index: u64,
    /// 0 for a new request, higher for retries of the identical request
    pub attempt: u32,
}

impl PageRequest {
    /// A first attempt at `cursor`
    pub fn new(cursor: Cursor, page_index: u64) -> Self {
        Self {
            cursor,
            page_index,
            attempt: 0,
        }
    }

    /// Whether this repeats an earlier failed request
    pub fn is_retry(&self) -> bool {
        self.attempt > 0
    }
}

/// Capability to fetch pages of items from one site
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Item type produced by this source
    type Item: Send;

    /// Fetch the page at `request.cursor`
    ///
    /// Errors carry their disposition: rate limits and temporary failures
    /// are retried by the caller, expired credentials trigger
    /// [`ItemSource::reauthenticate`], everything else ends the run.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Self::Item>>;

    /// Stable identity of an item, used for duplicate detection
    fn item_id(&self, _item: &Self::Item) -> Option<String> {
        None
    }

    /// Drop cached credentials and log in again
    async fn reauthenticate(&self) -> Result<()> {
        Err(Error::auth("source does not support re-authentication"))
    }
}

#[async_trait]
impl<S: ItemSource + ?Sized> ItemSource for Arc<S> {
    type Item = S::Item;

    async fn fetch_page(&self, request: &PageRequest) -> Result<Page<Self::Item>> {
        (**self).fetch_page(request).await
    }

    fn item_id(&self, item: &Self::Item) -> Option<String> {
        (**self).item_id(item)
    }

    async fn reauthenticate(&self) -> Result<()> {
        (**self).reauthenticate().await
    }
}
