//! Rate/backoff controller
//!
//! Wraps a single page fetch with status-driven retries.
//!
//! # Overview
//!
//! A response is first classified from its status, headers and body into a
//! [`Classification`]. Item sources turn that into an [`Error`](crate::Error)
//! whose [`Disposition`](crate::error::Disposition) the [`RetryController`]
//! acts on:
//!
//! - rate limited: wait for the server-announced time, retry the same request
//! - transient: wait for the computed backoff, retry the same request
//! - auth expired: refresh credentials once and retry
//! - fatal: give up immediately
//!
//! Every wait races a [`Cancellation`] handle.

mod cancel;
mod classify;
mod controller;
mod policy;

pub use cancel::Cancellation;
pub use classify::{
    classify_response, parse_reset, parse_retry_after, Classification, Classifier,
    HttpClassifier, DEFAULT_RATE_LIMIT_WAIT, DEFAULT_RISK_CONTROL_WAIT,
};
pub use controller::RetryController;
pub use policy::RetryPolicy;
