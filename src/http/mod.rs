//! HTTP client module
//!
//! Provides the requestor used by item sources and login flows.
//!
//! # Features
//!
//! - **Single attempt per call**: retries belong to the [`crate::retry`] controller
//! - **Request pacing**: Token bucket rate limiter using governor
//! - **Authentication**: Integration with the auth module and its token cache
//! - **Buffered responses**: status, headers and body captured for classification

mod client;
mod rate_limit;
mod response;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig, Requestor};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use response::{parse_link_header, HttpResponse};
