//! Pull-based page engine
//!
//! Turns an [`ItemSource`] and a [`Paginator`] into a lazy, finite sequence
//! of items. A page is fetched only when the previous one has been fully
//! consumed, so dropping the stream early performs no further requests.

use super::types::{
    Cursor, DedupPolicy, NextPage, Page, PaginationState, Paginator, StopReason,
};
use crate::error::{Error, Result};
use crate::retry::RetryController;
use crate::source::{ItemSource, PageRequest};
use futures::Stream;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lazy item sequence over all pages of a source
pub struct PageStream<S: ItemSource> {
    source: S,
    paginator: Box<dyn Paginator>,
    controller: Arc<RetryController>,
    dedup: DedupPolicy,
    state: PaginationState,
    /// Cursors already used for a new fetch
    requested: HashSet<Cursor>,
    /// Items of the current page not yet handed out
    buffer: VecDeque<S::Item>,
    /// Cursor of the page in `buffer`
    buffered_cursor: Option<Cursor>,
    /// Error to report once `buffer` drains
    pending: Option<Error>,
    stop: Option<StopReason>,
    failed: bool,
    pages: u64,
    yielded: u64,
}

impl<S: ItemSource> PageStream<S> {
    /// Create a stream starting at the paginator's first page
    pub fn new(source: S, paginator: impl Paginator + 'static) -> Self {
        let state = PaginationState::new(paginator.initial_cursor());
        Self {
            source,
            paginator: Box::new(paginator),
            controller: Arc::new(RetryController::default()),
            dedup: DedupPolicy::Off,
            state,
            requested: HashSet::new(),
            buffer: VecDeque::new(),
            buffered_cursor: None,
            pending: None,
            stop: None,
            failed: false,
            pages: 0,
            yielded: 0,
        }
    }

    /// Retry page fetches through `controller`
    #[must_use]
    pub fn with_controller(mut self, controller: Arc<RetryController>) -> Self {
        self.controller = controller;
        self
    }

    /// Set the duplicate handling policy
    #[must_use]
    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// Resume from a cursor persisted by an earlier run
    #[must_use]
    pub fn starting_at(mut self, cursor: Cursor) -> Self {
        let cursor = self.paginator.resume(cursor);
        info!("Resuming at cursor {cursor}");
        self.state = PaginationState::new(cursor);
        self
    }

    /// Cursor of the next page to request
    pub fn cursor(&self) -> &Cursor {
        &self.state.cursor
    }

    /// Current pagination state
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Value to persist for continuing in a later run
    ///
    /// While items of a page are still buffered this is that page's cursor,
    /// so a resumed run re-delivers the whole page rather than skipping the
    /// unconsumed part. `None` once the sequence ended cleanly.
    pub fn resume_token(&self) -> Option<String> {
        if let (false, Some(cursor)) = (self.buffer.is_empty(), &self.buffered_cursor) {
            return Some(cursor.to_string());
        }
        if self.stop.is_some() && self.pending.is_none() && !self.failed {
            return None;
        }
        Some(self.state.cursor.to_string())
    }

    /// Cursor of the page the most recently yielded item came from
    pub fn item_cursor(&self) -> Option<&Cursor> {
        self.buffered_cursor.as_ref()
    }

    /// Why pagination ended, if it did
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// Pages fetched so far
    pub fn pages_fetched(&self) -> u64 {
        self.pages
    }

    /// Items handed out so far
    pub fn items_yielded(&self) -> u64 {
        self.yielded
    }

    /// Retries performed by the controller
    pub fn retries(&self) -> u64 {
        self.controller.retries()
    }

    /// The item source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Next item, fetching a page when the buffer is empty
    ///
    /// Returns `Ok(None)` when pagination ended. After an error the
    /// sequence is over.
    pub async fn next_item(&mut self) -> Result<Option<S::Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                self.yielded += 1;
                return Ok(Some(item));
            }
            if let Some(err) = self.pending.take() {
                self.failed = true;
                return Err(err);
            }
            if self.state.exhausted || self.failed {
                return Ok(None);
            }
            if let Err(err) = self.fetch_next().await {
                self.failed = true;
                return Err(err);
            }
        }
    }

    /// Convert into a [`futures::Stream`] of items
    pub fn into_stream(self) -> impl Stream<Item = Result<S::Item>> {
        futures::stream::unfold(self, |mut stream| async move {
            match stream.next_item().await {
                Ok(Some(item)) => Some((Ok(item), stream)),
                Ok(None) => None,
                Err(err) => Some((Err(err), stream)),
            }
        })
    }

    async fn fetch_next(&mut self) -> Result<()> {
        let cursor = self.state.cursor.clone();
        let page_index = self.state.page_index;

        if !self.requested.insert(cursor.clone()) {
            return Err(Error::stuck(cursor.to_string()));
        }

        debug!("Fetching page {} at cursor {cursor}", page_index + 1);
        let source = &self.source;
        let request_cursor = cursor.clone();
        let page = self
            .controller
            .execute(
                move |attempt| {
                    let request = PageRequest {
                        cursor: request_cursor.clone(),
                        page_index,
                        attempt,
                    };
                    async move { source.fetch_page(&request).await }
                },
                || source.reauthenticate(),
            )
            .await?;
        self.pages += 1;

        self.accept(cursor, page);
        Ok(())
    }

    /// Buffer a fetched page and decide what comes after it
    fn accept(&mut self, cursor: Cursor, mut page: Page<S::Item>) {
        let count = page.len();
        let state = std::mem::take(&mut self.state);

        if page.is_empty() {
            debug!("Page {} is empty", state.page_index + 1);
            self.state = state.finish(0, Vec::new());
            self.finish(StopReason::EmptyPage);
            return;
        }

        let ids: Vec<Option<String>> = page.items.iter().map(|i| self.source.item_id(i)).collect();
        if page.signal.last_id.is_none() {
            page.signal.last_id = ids.last().cloned().flatten();
        }

        let repeated = self.dedup != DedupPolicy::Off
            && ids
                .iter()
                .all(|id| id.as_deref().is_some_and(|id| state.has_seen(id)));

        let next = self.paginator.next_cursor(&state, &page.signal, count);
        let total = page.signal.total;
        let fetched = state.total_fetched + count as u64;

        let stop = if page.signal.has_more == Some(false) || next.is_done() {
            Some(StopReason::NoMore)
        } else if total.is_none()
            && self.paginator.per_page().is_some_and(|per_page| count < per_page)
        {
            Some(StopReason::ShortPage)
        } else if total.is_some_and(|total| fetched >= total) {
            Some(StopReason::TotalReached)
        } else if repeated {
            Some(StopReason::DuplicatePage)
        } else {
            None
        };

        if repeated {
            warn!(
                "Page {} at cursor {cursor} repeats items already seen",
                state.page_index + 1
            );
        } else {
            self.buffer_items(page.items, &ids, &state);
            self.buffered_cursor = Some(cursor.clone());
        }

        let seen: Vec<String> = ids.into_iter().flatten().collect();
        match (stop, next) {
            (Some(reason), _) => {
                self.state = state.finish(count, seen);
                self.finish(reason);
            }
            (None, NextPage::Continue(next)) if next == cursor || self.requested.contains(&next) => {
                self.state = state.finish(count, seen);
                self.state.cursor = next.clone();
                self.pending = Some(Error::stuck(next.to_string()));
            }
            (None, NextPage::Continue(next)) => {
                self.state = state.advance(next, count, seen);
            }
            (None, NextPage::Done) => {
                self.state = state.finish(count, seen);
                self.finish(StopReason::NoMore);
            }
        }
    }

    fn buffer_items(&mut self, items: Vec<S::Item>, ids: &[Option<String>], state: &PaginationState) {
        if self.dedup != DedupPolicy::DropSeen {
            self.buffer.extend(items);
            return;
        }

        let mut page_ids = HashSet::new();
        for (item, id) in items.into_iter().zip(ids) {
            if let Some(id) = id {
                if state.has_seen(id) || !page_ids.insert(id.as_str()) {
                    debug!("Dropping repeated item {id}");
                    continue;
                }
            }
            self.buffer.push_back(item);
        }
    }

    fn finish(&mut self, reason: StopReason) {
        info!(
            "Pagination finished after {} pages ({reason})",
            self.state.page_index
        );
        self.stop = Some(reason);
    }
}

impl<S: ItemSource> std::fmt::Debug for PageStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("state", &self.state)
            .field("dedup", &self.dedup)
            .field("buffered", &self.buffer.len())
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}
