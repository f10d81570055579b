//! Backing stores for [`super::ResponseCache`].
//!
//! A store holds at most one entry per key; `put` replaces whatever was
//! there. Nothing is ever evicted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::CacheEntry;
use crate::error::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Stores `entry` under `entry.key`, replacing any previous entry.
    async fn put(&self, entry: CacheEntry) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.write().await.insert(entry.key.clone(), entry);
        Ok(())
    }
}

/// Memory store snapshotted to a JSON file after every write, so entries
/// survive a restart.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_snapshot(&path).await {
            Ok(entries) => {
                debug!("Loaded {} cache entries from {}", entries.len(), path.display());
                entries
            }
            Err(e) => {
                warn!("Starting with empty cache, could not read {}: {}", path.display(), e);
                HashMap::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        // Write lock spans the snapshot: writers persist in order.
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        let json = serde_json::to_vec_pretty(&*entries)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

async fn load_snapshot(path: &Path) -> Result<HashMap<String, CacheEntry>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn entry(key: &str, value: serde_json::Value) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            timestamp: Utc::now(),
            value,
        }
    }

    #[tokio::test]
    async fn put_replaces_existing_entry() {
        let store = MemoryStore::new();
        store.put(entry("weather:pune", json!({"temp": 20}))).await.unwrap();
        store.put(entry("weather:pune", json!({"temp": 31}))).await.unwrap();

        let got = store.get("weather:pune").await.unwrap();
        assert_eq!(got.value, json!({"temp": 31}));
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let store = FileStore::open(&path).await;
        store.put(entry("price:tomato:maharashtra", json!({"modal_price": 1200.0}))).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await;
        let got = reopened.get("price:tomato:maharashtra").await.unwrap();
        assert_eq!(got.value["modal_price"], json!(1200.0));
    }

    #[tokio::test]
    async fn corrupt_snapshot_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store = FileStore::open(&path).await;
        assert!(store.get("anything").await.is_none());
    }

    #[tokio::test]
    async fn failed_snapshot_keeps_entry_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        // The parent "directory" is a regular file, so the snapshot cannot be written.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = FileStore::open(blocker.join("cache.json")).await;

        let result = store.put(entry("weather:nashik", json!({"temp": 25}))).await;
        assert!(result.is_err());
        assert!(store.get("weather:nashik").await.is_some());
    }
}
