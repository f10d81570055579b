//! Farm records kept as JSON files in the data directory.

pub mod crops;
pub mod expenses;
pub mod soil;

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::error::Result;
pub use crops::{Crop, CropBook};
pub use expenses::{Expense, ExpenseLedger, FinanceSummary};
pub use soil::{SoilRegistry, SoilReport, SoilSample};

/// One JSON document on disk. Reads are lenient (missing or corrupt files
/// read as `T::default()`); callers hold [`JsonFile::lock`] across a
/// read-modify-write.
pub struct JsonFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _doc: PhantomData,
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub async fn load(&self) -> T {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(_) => return T::default(),
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            warn!("Treating corrupt {} as empty: {}", self.path.display(), e);
            T::default()
        })
    }

    pub async fn save(&self, doc: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(doc)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// All farm records rooted at one data directory.
pub struct FarmStore {
    pub crops: CropBook,
    pub expenses: ExpenseLedger,
    pub soil: SoilRegistry,
}

impl FarmStore {
    pub fn open(data_dir: &Path) -> Self {
        Self {
            crops: CropBook::new(data_dir.join("crops.json")),
            expenses: ExpenseLedger::new(data_dir.join("expenses.json")),
            soil: SoilRegistry::new(data_dir.join("soil.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_and_corrupt_files_load_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<String>> = JsonFile::new(dir.path().join("missing.json"));
        assert!(file.load().await.is_empty());

        std::fs::write(dir.path().join("bad.json"), b"{\"oops\":").unwrap();
        let bad: JsonFile<Vec<String>> = JsonFile::new(dir.path().join("bad.json"));
        assert!(bad.load().await.is_empty());
    }

    #[tokio::test]
    async fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("list.json");
        let file: JsonFile<Vec<String>> = JsonFile::new(&path);
        file.save(&vec!["wheat".to_string()]).await.unwrap();

        assert!(path.exists());
        assert_eq!(file.load().await, vec!["wheat".to_string()]);
    }
}
