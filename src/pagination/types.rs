//! Pagination types and traits
//!
//! Defines the cursor, the per-run state and the page abstraction shared by
//! every strategy and by the [`PageStream`](super::PageStream) engine.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Cursor
// ============================================================================

/// Position of the next page to request
///
/// Its string form is what gets persisted for "continue later" resumption:
///
/// | Cursor | String |
/// |---|---|
/// | `Start` | `start` |
/// | `Offset(100)` | `offset:100` |
/// | `Page(3)` | `page:3` |
/// | `Token("abc")` | `token:abc` |
/// | `Url(u)` | the URL itself |
/// | `Keyset("42")` | `keyset:42` |
///
/// Parsing a string without a known prefix yields a `Token`, so raw
/// bookmark values from a site can be passed as they are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Cursor {
    /// Before the first page
    #[default]
    Start,
    /// Item offset
    Offset(u64),
    /// Page number
    Page(u64),
    /// Opaque continuation token
    Token(String),
    /// Absolute URL of the next page
    Url(String),
    /// Id of the last item seen
    Keyset(String),
}

impl Cursor {
    /// Whether this is the initial position
    pub fn is_start(&self) -> bool {
        matches!(self, Self::Start)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => f.write_str("start"),
            Cursor::Offset(n) => write!(f, "offset:{n}"),
            Cursor::Page(n) => write!(f, "page:{n}"),
            Cursor::Token(t) => write!(f, "token:{t}"),
            Cursor::Url(u) => f.write_str(u),
            Cursor::Keyset(id) => write!(f, "keyset:{id}"),
        }
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid_cursor(s, "empty cursor"));
        }
        if s == "start" {
            return Ok(Cursor::Start);
        }
        if s.starts_with("http://") || s.starts_with("https://") {
            return Ok(Cursor::Url(s.to_string()));
        }

        let Some((kind, value)) = s.split_once(':') else {
            return Ok(Cursor::Token(s.to_string()));
        };

        match kind {
            "offset" => value
                .parse()
                .map(Cursor::Offset)
                .map_err(|_| invalid_cursor(s, "offset must be a non-negative integer")),
            "page" => value
                .parse()
                .map(Cursor::Page)
                .map_err(|_| invalid_cursor(s, "page must be a non-negative integer")),
            "token" if !value.is_empty() => Ok(Cursor::Token(value.to_string())),
            "keyset" if !value.is_empty() => Ok(Cursor::Keyset(value.to_string())),
            "token" | "keyset" => Err(invalid_cursor(s, "missing value")),
            _ => Ok(Cursor::Token(s.to_string())),
        }
    }
}

fn invalid_cursor(value: &str, message: &str) -> Error {
    Error::InvalidCursor {
        value: value.to_string(),
        message: message.to_string(),
    }
}

// ============================================================================
// Pages
// ============================================================================

/// "How to get the next page" information returned with a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSignal {
    /// Continuation token
    pub next_token: Option<String>,
    /// URL of the next page
    pub next_url: Option<String>,
    /// Explicit more-pages flag
    pub has_more: Option<bool>,
    /// Total item count announced by the server
    pub total: Option<u64>,
    /// Id of the last item, for keyset pagination
    pub last_id: Option<String>,
}

impl PageSignal {
    /// Empty signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the continuation token
    #[must_use]
    pub fn next_token(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }

    /// Set the next page URL
    #[must_use]
    pub fn next_url(mut self, url: impl Into<String>) -> Self {
        self.next_url = Some(url.into());
        self
    }

    /// Set the more-pages flag
    #[must_use]
    pub fn has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }

    /// Set the announced total
    #[must_use]
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Set the last item id
    #[must_use]
    pub fn last_id(mut self, id: impl Into<String>) -> Self {
        self.last_id = Some(id.into());
        self
    }
}

/// One fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in source order
    pub items: Vec<T>,
    /// Next-page information
    pub signal: PageSignal,
}

impl<T> Page<T> {
    /// Create a page
    pub fn new(items: Vec<T>, signal: PageSignal) -> Self {
        Self { items, signal }
    }

    /// A page with no items and no signal
    pub fn empty() -> Self {
        Self::new(Vec::new(), PageSignal::default())
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the page holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// State
// ============================================================================

/// Progress of one pagination run
///
/// Owned by the engine and replaced wholesale after every page.
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Cursor of the next page to request
    pub cursor: Cursor,
    /// Number of pages fetched
    pub page_index: u64,
    /// Items received so far
    pub total_fetched: u64,
    /// Ids of items received so far
    pub seen_ids: HashSet<String>,
    /// No more pages will be requested
    pub exhausted: bool,
}

impl PaginationState {
    /// Create state positioned at `cursor`
    pub fn new(cursor: Cursor) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// State after a page of `fetched` items, positioned at `cursor`
    #[must_use]
    pub fn advance(
        mut self,
        cursor: Cursor,
        fetched: usize,
        ids: impl IntoIterator<Item = String>,
    ) -> Self {
        self.cursor = cursor;
        self.page_index += 1;
        self.total_fetched += fetched as u64;
        self.seen_ids.extend(ids);
        self
    }

    /// Final state: keeps the cursor, fetches nothing more
    #[must_use]
    pub fn finish(mut self, fetched: usize, ids: impl IntoIterator<Item = String>) -> Self {
        self.page_index += 1;
        self.total_fetched += fetched as u64;
        self.seen_ids.extend(ids);
        self.exhausted = true;
        self
    }

    /// Whether an item id was already received
    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }
}

// ============================================================================
// Paginator
// ============================================================================

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Request the page at this cursor next
    Continue(Cursor),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Why a run stopped requesting pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned no items
    EmptyPage,
    /// The source or the paginator said there is nothing more
    NoMore,
    /// Fewer items than a full page and no total to compare against
    ShortPage,
    /// The announced total was reached
    TotalReached,
    /// Every item on the page had been seen before
    DuplicatePage,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EmptyPage => "empty page",
            StopReason::NoMore => "no more pages",
            StopReason::ShortPage => "short page",
            StopReason::TotalReached => "total reached",
            StopReason::DuplicatePage => "duplicate page",
        };
        f.write_str(text)
    }
}

/// What to do with items whose id was already received
///
/// Some sites legitimately repeat items, so this is opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Deliver everything
    #[default]
    Off,
    /// Stop when a whole page repeats
    ///
    /// A page whose ids were all seen before is not delivered at all, even
    /// when the site legitimately lists some items twice. Partially repeated
    /// pages are delivered unchanged.
    StopOnRepeat,
    /// Drop repeated items, and stop when a whole page repeats
    DropSeen,
}

/// Cursor-update rule of a pagination scheme
pub trait Paginator: Send + Sync {
    /// Cursor of the first page
    fn initial_cursor(&self) -> Cursor {
        Cursor::Start
    }

    /// Items per full page, when the scheme declares one
    fn per_page(&self) -> Option<usize> {
        None
    }

    /// Normalize a cursor restored from a previous run
    fn resume(&self, cursor: Cursor) -> Cursor {
        cursor
    }

    /// Query parameters selecting the page at `cursor`
    fn request_params(&self, cursor: &Cursor) -> HashMap<String, String>;

    /// Cursor of the page after one with `count` items and `signal`
    fn next_cursor(&self, state: &PaginationState, signal: &PageSignal, count: usize)
        -> NextPage;
}

macro_rules! forward_paginator {
    ($wrapper:ident) => {
        impl<P: Paginator + ?Sized> Paginator for $wrapper<P> {
            fn initial_cursor(&self) -> Cursor {
                (**self).initial_cursor()
            }

            fn per_page(&self) -> Option<usize> {
                (**self).per_page()
            }

            fn resume(&self, cursor: Cursor) -> Cursor {
                (**self).resume(cursor)
            }

            fn request_params(&self, cursor: &Cursor) -> HashMap<String, String> {
                (**self).request_params(cursor)
            }

            fn next_cursor(
                &self,
                state: &PaginationState,
                signal: &PageSignal,
                count: usize,
            ) -> NextPage {
                (**self).next_cursor(state, signal, count)
            }
        }
    };
}

forward_paginator!(Box);
forward_paginator!(Arc);
