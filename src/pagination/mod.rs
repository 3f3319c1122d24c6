//! Pagination module
//!
//! Supports: Cursor/token, Offset, Page Number, Next URL (body or Link
//! header), Keyset
//!
//! # Overview
//!
//! The pagination module turns the many pagination schemes of media sites
//! into one lazy item sequence. A [`Paginator`] maps a [`Cursor`] to request
//! parameters and derives the next cursor from a page's [`PageSignal`]; the
//! [`PageStream`] engine drives an item source page by page, applies the
//! termination rules and exposes the cursor for "continue later" runs.
//!
//! Termination is checked after every page, in this order (an empty page
//! always ends the run):
//!
//! 1. the source or paginator says there is nothing more
//! 2. a short page while no total is known
//! 3. the announced total was reached
//! 4. every item on the page was already seen (dedup enabled only)

mod strategies;
mod stream;
mod types;

pub use strategies::{
    CursorPaginator, KeysetPaginator, NextUrlPaginator, NoPaginator, OffsetPaginator,
    PageNumberPaginator,
};
pub use stream::PageStream;
pub use types::{
    Cursor, DedupPolicy, NextPage, Page, PageSignal, PaginationState, Paginator, StopReason,
};
