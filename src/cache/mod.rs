//! Time-boxed response cache for the external data sources.
//!
//! [`ResponseCache::get_or_fetch`] serves a stored payload while it is
//! younger than the caller's TTL and otherwise runs the fetcher and stores
//! its result. [`ResponseCache::fetch_with_fallback`] layers the
//! last-known-good slot on top, so a failed refresh can still show the most
//! recent value for that resource type.

pub mod last_known;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
pub use last_known::{FetchTicket, LastKnownGood};
pub use store::{CacheStore, FileStore, MemoryStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub value: serde_json::Value,
}

impl CacheEntry {
    /// `now - timestamp < ttl`. Entries stamped in the future count as fresh.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        match Utc::now().signed_duration_since(self.timestamp).to_std() {
            Ok(age) => age < ttl,
            Err(_) => !ttl.is_zero(),
        }
    }
}

/// Outcome of [`ResponseCache::fetch_with_fallback`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Fresh(T),
    /// The fetch failed; `value` is the last-known-good payload.
    Stale { value: T, reason: String },
}

impl<T> Fetched<T> {
    pub fn into_inner(self) -> T {
        match self {
            Fetched::Fresh(value) => value,
            Fetched::Stale { value, .. } => value,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Fetched::Stale { .. })
    }
}

#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    last_known: Arc<LastKnownGood>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            last_known: Arc::new(LastKnownGood::new(store.clone())),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn last_known(&self) -> &LastKnownGood {
        &self.last_known
    }

    /// Store key for a TTL entry. The `cache:` prefix keeps caller keys
    /// apart from the `last:` slots, whatever the caller puts in `key`.
    pub fn entry_key(key: &str) -> String {
        format!("cache:{}", key)
    }

    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let stored = Self::entry_key(key);
        if let Some(entry) = self.store.get(&stored).await {
            if entry.is_fresh(ttl) {
                match serde_json::from_value::<T>(entry.value) {
                    Ok(value) => {
                        debug!("Cache hit for {}", key);
                        return Ok(value);
                    }
                    Err(e) => warn!("Ignoring undecodable cache entry for {}: {}", key, e),
                }
            } else {
                debug!("Cache entry for {} expired", key);
            }
        }

        debug!("Cache miss for {}, fetching", key);
        let value = fetcher().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                let entry = CacheEntry {
                    key: stored,
                    timestamp: Utc::now(),
                    value: json,
                };
                if let Err(e) = self.store.put(entry).await {
                    warn!("Cache write for {} failed: {}", key, e);
                }
            }
            Err(e) => warn!("Could not serialize value for {}: {}", key, e),
        }

        Ok(value)
    }

    /// `get_or_fetch`, recording every success as the last-known-good value
    /// for `resource` and answering from that slot when the fetch fails.
    pub async fn fetch_with_fallback<T, F, Fut>(
        &self,
        resource: &str,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ticket = self.last_known.begin(resource).await;

        match self.get_or_fetch(key, ttl, fetcher).await {
            Ok(value) => {
                self.last_known.record(&ticket, &value).await;
                Ok(Fetched::Fresh(value))
            }
            Err(err) => match self.last_known.recall::<T>(resource).await {
                Some(value) => {
                    warn!("Fetch for {} failed, serving last known {}: {}", key, resource, err);
                    Ok(Fetched::Stale {
                        value,
                        reason: err.to_string(),
                    })
                }
                None => Err(err),
            },
        }
    }
}
