//! Last-known-good slot: one TTL-less value per resource type, kept only
//! to render a "last seen" view when a fresh fetch fails.
//!
//! Every fetch takes a [`FetchTicket`] when it starts. A result is recorded
//! only if no later-started fetch of the same resource has recorded first,
//! so a slow superseded request cannot overwrite a newer value.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{CacheEntry, CacheStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    resource: String,
    generation: u64,
}

#[derive(Default)]
struct Generations {
    issued: u64,
    recorded: u64,
}

pub struct LastKnownGood {
    store: Arc<dyn CacheStore>,
    generations: Mutex<HashMap<String, Generations>>,
}

impl LastKnownGood {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn slot_key(resource: &str) -> String {
        format!("last:{}", resource)
    }

    pub async fn begin(&self, resource: &str) -> FetchTicket {
        let mut generations = self.generations.lock().await;
        let slot = generations.entry(resource.to_string()).or_default();
        slot.issued += 1;
        FetchTicket {
            resource: resource.to_string(),
            generation: slot.issued,
        }
    }

    /// Stores `value` for the ticket's resource. Returns false when a newer
    /// fetch already recorded, or the value could not be stored.
    pub async fn record<T: Serialize>(&self, ticket: &FetchTicket, value: &T) -> bool {
        let mut generations = self.generations.lock().await;
        let slot = generations.entry(ticket.resource.clone()).or_default();
        if ticket.generation < slot.recorded {
            debug!(
                "Dropping superseded {} result (generation {} < {})",
                ticket.resource, ticket.generation, slot.recorded
            );
            return false;
        }

        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not serialize last known {}: {}", ticket.resource, e);
                return false;
            }
        };
        slot.recorded = ticket.generation;

        let key = Self::slot_key(&ticket.resource);
        if let Some(current) = self.store.get(&key).await {
            if current.value == json {
                debug!("Last known {} unchanged, skipping write", ticket.resource);
                return true;
            }
        }

        let entry = CacheEntry {
            key,
            timestamp: Utc::now(),
            value: json,
        };
        if let Err(e) = self.store.put(entry).await {
            warn!("Last known {} write failed: {}", ticket.resource, e);
            return false;
        }
        true
    }

    pub async fn recall<T: DeserializeOwned>(&self, resource: &str) -> Option<T> {
        let entry = self.store.get(&Self::slot_key(resource)).await?;
        serde_json::from_value(entry.value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn slot() -> LastKnownGood {
        LastKnownGood::new(Arc::new(MemoryStore::new()))
    }

    /// Memory store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        puts: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for CountingStore {
        async fn get(&self, key: &str) -> Option<CacheEntry> {
            self.inner.get(key).await
        }

        async fn put(&self, entry: CacheEntry) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(entry).await
        }
    }

    #[tokio::test]
    async fn tickets_increase_per_resource() {
        let lkg = slot();
        let a = lkg.begin("weather").await;
        let b = lkg.begin("weather").await;
        let c = lkg.begin("price").await;

        assert_eq!(a.generation, 1);
        assert_eq!(b.generation, 2);
        assert_eq!(c.generation, 1);
        assert_eq!(c.resource, "price");
    }

    #[tokio::test]
    async fn superseded_fetch_does_not_overwrite_newer_value() {
        let lkg = slot();
        let slow = lkg.begin("weather").await;
        let fast = lkg.begin("weather").await;

        assert!(lkg.record(&fast, &"mumbai").await);
        assert!(!lkg.record(&slow, &"pune").await);

        let last: String = lkg.recall("weather").await.unwrap();
        assert_eq!(last, "mumbai");
    }

    #[tokio::test]
    async fn in_order_completions_both_record() {
        let lkg = slot();
        let first = lkg.begin("price").await;
        let second = lkg.begin("price").await;

        assert!(lkg.record(&first, &1200).await);
        assert!(lkg.record(&second, &1350).await);

        let last: i64 = lkg.recall("price").await.unwrap();
        assert_eq!(last, 1350);
    }

    #[tokio::test]
    async fn unchanged_value_is_not_rewritten() {
        let store = Arc::new(CountingStore::default());
        let lkg = LastKnownGood::new(store.clone());

        for _ in 0..3 {
            let ticket = lkg.begin("weather").await;
            assert!(lkg.record(&ticket, &"pune").await);
        }
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        let ticket = lkg.begin("weather").await;
        assert!(lkg.record(&ticket, &"nagpur").await);
        assert_eq!(store.puts.load(Ordering::SeqCst), 2);
        assert_eq!(lkg.recall::<String>("weather").await.unwrap(), "nagpur");
    }

    #[tokio::test]
    async fn recall_without_value_is_none() {
        let lkg = slot();
        assert!(lkg.recall::<String>("weather").await.is_none());
    }

    #[test]
    fn slot_key_lives_outside_the_cache_namespace() {
        assert_eq!(LastKnownGood::slot_key("weather"), "last:weather");
        assert_ne!(
            LastKnownGood::slot_key("weather"),
            crate::cache::ResponseCache::entry_key("weather:last")
        );
    }
}
