//! Process-wide token cache
//!
//! Memoizes login results keyed by credential identity. Each key owns an
//! async mutex held across the login, so concurrent callers for the same
//! account wait for one login instead of starting their own, while logins
//! for different keys proceed independently.

use super::types::CachedToken;
use crate::error::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// Default lifetime of a cached login ("remember me" style sessions)
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(14 * 86400);

type Slot = Arc<AsyncMutex<Option<CachedToken>>>;

static GLOBAL: Lazy<Arc<TokenCache>> = Lazy::new(|| Arc::new(TokenCache::default()));

/// Expiry-aware memoization of login results
#[derive(Debug)]
pub struct TokenCache {
    max_age: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl TokenCache {
    /// Create a cache whose entries expire after `max_age`
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The cache shared by every extractor in this process
    pub fn global() -> Arc<TokenCache> {
        Arc::clone(&GLOBAL)
    }

    /// Default entry lifetime
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Return the cached token for `key`, running `login` if it is absent or expired
    ///
    /// A failing `login` propagates its error and leaves nothing cached.
    pub async fn get_or_create<F, Fut, T>(&self, key: &str, login: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<CachedToken>,
    {
        self.get_or_create_with(key, self.max_age, login).await
    }

    /// Like [`TokenCache::get_or_create`] with a per-source lifetime
    pub async fn get_or_create_with<F, Fut, T>(
        &self,
        key: &str,
        max_age: Duration,
        login: F,
    ) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
        T: Into<CachedToken>,
    {
        let slot = self.slot(key);
        let mut entry = slot.lock().await;

        if let Some(token) = entry.as_ref() {
            if !token.is_expired(max_age) {
                return Ok(token.value.clone());
            }
            debug!("Cached token for '{key}' expired");
        }

        *entry = None;
        let token: CachedToken = login().await?.into();
        debug!("Stored new token for '{key}'");
        let value = token.value.clone();
        *entry = Some(token);
        Ok(value)
    }

    /// Return the cached token for `key` if present and not expired
    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_with(key, self.max_age).await
    }

    /// Like [`TokenCache::get`] with an explicit lifetime instead of the cache's
    pub async fn get_with(&self, key: &str, max_age: Duration) -> Option<String> {
        let slot = self.existing_slot(key)?;
        let entry = slot.lock().await;
        entry
            .as_ref()
            .filter(|token| !token.is_expired(max_age))
            .map(|token| token.value.clone())
    }

    /// Store a token obtained elsewhere
    pub async fn insert(&self, key: &str, token: impl Into<CachedToken>) {
        let slot = self.slot(key);
        *slot.lock().await = Some(token.into());
    }

    /// Remove the entry for `key` unconditionally
    pub async fn invalidate(&self, key: &str) {
        if let Some(slot) = self.existing_slot(key) {
            *slot.lock().await = None;
            debug!("Invalidated cached token for '{key}'");
        }
    }

    /// Remove every entry
    pub async fn clear(&self) {
        let slots: Vec<Slot> = self.lock_slots().values().cloned().collect();
        for slot in slots {
            *slot.lock().await = None;
        }
    }

    fn slot(&self, key: &str) -> Slot {
        self.lock_slots()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn existing_slot(&self, key: &str) -> Option<Slot> {
        self.lock_slots().get(key).cloned()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGE)
    }
}
