//! Authentication module
//!
//! Supports: API Key, Basic, Bearer, Session login, OAuth2 client credentials
//! and OAuth2 refresh tokens.
//!
//! Login results are memoized in a [`TokenCache`] keyed by credential
//! identity, shared across extractors and guarded per key so one account
//! never logs in twice concurrently.

mod authenticator;
mod cache;
mod types;

pub use authenticator::Authenticator;
pub use cache::{TokenCache, DEFAULT_MAX_AGE};
pub use types::{AuthConfig, CachedToken, Location};

#[cfg(test)]
mod tests;
