//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern: how a cursor maps to
//! request parameters and how the next cursor follows from a page.

use super::types::{Cursor, NextPage, PageSignal, PaginationState, Paginator};
use std::collections::HashMap;

fn limit_param(params: &mut HashMap<String, String>, param: Option<&String>, limit: Option<u64>) {
    if let (Some(param), Some(limit)) = (param, limit) {
        params.insert(param.clone(), limit.to_string());
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Token-based pagination (bookmarks, `max_id`, opaque cursors)
///
/// Common patterns:
/// - `?cursor=abc123`
/// - `?bookmark=...&page_size=25`
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for the token
    pub cursor_param: String,
    /// Optional page size parameter name
    pub limit_param: Option<String>,
    /// Page size value
    pub limit: Option<u64>,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(cursor_param: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            limit_param: None,
            limit: None,
        }
    }

    /// Request pages of `limit` items
    #[must_use]
    pub fn with_limit(mut self, param: impl Into<String>, limit: u64) -> Self {
        self.limit_param = Some(param.into());
        self.limit = Some(limit);
        self
    }
}

impl Paginator for CursorPaginator {
    fn per_page(&self) -> Option<usize> {
        self.limit.map(|l| l as usize)
    }

    fn request_params(&self, cursor: &Cursor) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Cursor::Token(token) = cursor {
            params.insert(self.cursor_param.clone(), token.clone());
        }
        limit_param(&mut params, self.limit_param.as_ref(), self.limit);
        params
    }

    fn next_cursor(&self, _state: &PaginationState, signal: &PageSignal, _count: usize) -> NextPage {
        match signal.next_token.as_deref() {
            Some(token) if !token.is_empty() => NextPage::Continue(Cursor::Token(token.to_string())),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination
///
/// The offset advances by the number of items actually received, so servers
/// that return fewer items than asked for do not cause gaps.
/// Common patterns:
/// - `?offset=100&limit=50`
/// - `?o=150` (fixed server batch)
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Optional page size parameter name
    pub limit_param: Option<String>,
    /// Number of records per page
    pub limit: u64,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(offset_param: impl Into<String>, limit: u64) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: None,
            limit,
        }
    }

    /// Send the page size as `param`
    #[must_use]
    pub fn with_limit_param(mut self, param: impl Into<String>) -> Self {
        self.limit_param = Some(param.into());
        self
    }
}

impl Paginator for OffsetPaginator {
    fn initial_cursor(&self) -> Cursor {
        Cursor::Offset(0)
    }

    fn per_page(&self) -> Option<usize> {
        Some(self.limit as usize)
    }

    /// Round a resumed offset down to a page boundary
    fn resume(&self, cursor: Cursor) -> Cursor {
        match cursor {
            Cursor::Offset(offset) if self.limit > 0 => {
                Cursor::Offset(offset - offset % self.limit)
            }
            Cursor::Start => self.initial_cursor(),
            other => other,
        }
    }

    fn request_params(&self, cursor: &Cursor) -> HashMap<String, String> {
        let offset = match cursor {
            Cursor::Offset(offset) => *offset,
            _ => 0,
        };
        let mut params = HashMap::new();
        params.insert(self.offset_param.clone(), offset.to_string());
        limit_param(&mut params, self.limit_param.as_ref(), Some(self.limit));
        params
    }

    fn next_cursor(&self, state: &PaginationState, _signal: &PageSignal, count: usize) -> NextPage {
        let offset = match state.cursor {
            Cursor::Offset(offset) => offset,
            _ => 0,
        };
        NextPage::Continue(Cursor::Offset(offset + count as u64))
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination
///
/// Common patterns:
/// - `?page=2`
/// - `?p=2&per_page=50`
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// Query parameter name for page number
    pub page_param: String,
    /// First page number (usually 0 or 1)
    pub start_page: u64,
    /// Optional page size parameter name
    pub page_size_param: Option<String>,
    /// Page size value
    pub page_size: Option<u64>,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(page_param: impl Into<String>, start_page: u64) -> Self {
        Self {
            page_param: page_param.into(),
            start_page,
            page_size_param: None,
            page_size: None,
        }
    }

    /// Set page size parameter
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u64) -> Self {
        self.page_size_param = Some(param.into());
        self.page_size = Some(size);
        self
    }

    fn page_of(&self, cursor: &Cursor) -> u64 {
        match cursor {
            Cursor::Page(page) => *page,
            _ => self.start_page,
        }
    }
}

impl Paginator for PageNumberPaginator {
    fn initial_cursor(&self) -> Cursor {
        Cursor::Page(self.start_page)
    }

    fn per_page(&self) -> Option<usize> {
        self.page_size.map(|s| s as usize)
    }

    fn resume(&self, cursor: Cursor) -> Cursor {
        match cursor {
            Cursor::Start => self.initial_cursor(),
            other => other,
        }
    }

    fn request_params(&self, cursor: &Cursor) -> HashMap<String, String> {
        let mut params = HashMap::new();
        params.insert(self.page_param.clone(), self.page_of(cursor).to_string());
        limit_param(&mut params, self.page_size_param.as_ref(), self.page_size);
        params
    }

    fn next_cursor(&self, state: &PaginationState, _signal: &PageSignal, _count: usize) -> NextPage {
        NextPage::Continue(Cursor::Page(self.page_of(&state.cursor) + 1))
    }
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Follow the next page URL named by the response
///
/// The URL comes from the body (`{"next": "..."}`) or from a `Link` header
/// (RFC 5988); the item source decides which and fills the page signal.
#[derive(Debug, Clone, Default)]
pub struct NextUrlPaginator;

impl NextUrlPaginator {
    /// Create a new next URL paginator
    pub fn new() -> Self {
        Self
    }
}

impl Paginator for NextUrlPaginator {
    fn request_params(&self, _cursor: &Cursor) -> HashMap<String, String> {
        HashMap::new()
    }

    fn next_cursor(&self, _state: &PaginationState, signal: &PageSignal, _count: usize) -> NextPage {
        match signal.next_url.as_deref() {
            Some(url) if !url.is_empty() => NextPage::Continue(Cursor::Url(url.to_string())),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// Keyset Pagination
// ============================================================================

/// Continue after the id of the last item (`?max_id=`, `?before=`)
#[derive(Debug, Clone)]
pub struct KeysetPaginator {
    /// Query parameter carrying the last id
    pub param: String,
    /// Optional page size parameter name
    pub limit_param: Option<String>,
    /// Page size value
    pub limit: Option<u64>,
}

impl KeysetPaginator {
    /// Create a new keyset paginator
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            limit_param: None,
            limit: None,
        }
    }

    /// Request pages of `limit` items
    #[must_use]
    pub fn with_limit(mut self, param: impl Into<String>, limit: u64) -> Self {
        self.limit_param = Some(param.into());
        self.limit = Some(limit);
        self
    }
}

impl Paginator for KeysetPaginator {
    fn per_page(&self) -> Option<usize> {
        self.limit.map(|l| l as usize)
    }

    fn request_params(&self, cursor: &Cursor) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Cursor::Keyset(id) = cursor {
            params.insert(self.param.clone(), id.clone());
        }
        limit_param(&mut params, self.limit_param.as_ref(), self.limit);
        params
    }

    fn next_cursor(&self, _state: &PaginationState, signal: &PageSignal, _count: usize) -> NextPage {
        match signal.last_id.as_deref() {
            Some(id) if !id.is_empty() => NextPage::Continue(Cursor::Keyset(id.to_string())),
            _ => NextPage::Done,
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn request_params(&self, _cursor: &Cursor) -> HashMap<String, String> {
        HashMap::new()
    }

    fn next_cursor(&self, _state: &PaginationState, _signal: &PageSignal, _count: usize) -> NextPage {
        NextPage::Done
    }
}
