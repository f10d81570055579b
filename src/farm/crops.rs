use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::JsonFile;
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub crop: String,
    pub plot: String,
    pub sown_date: String,
    pub stage: String,
    pub progress: u8,
}

pub struct CropBook {
    file: JsonFile<Vec<Crop>>,
}

impl CropBook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub async fn add(&self, crop: &str, plot: &str) -> Result<Crop> {
        let _guard = self.file.lock().await;
        let mut crops = self.file.load().await;

        let new_crop = Crop {
            crop: crop.to_string(),
            plot: plot.to_string(),
            sown_date: Local::now().format("%d %b %Y").to_string(),
            stage: "Sown".to_string(),
            progress: 0,
        };
        crops.push(new_crop.clone());
        self.file.save(&crops).await?;

        info!("Added crop {} on plot {}", crop, plot);
        Ok(new_crop)
    }

    /// Removes the crop at `index` in stored (oldest first) order.
    pub async fn delete(&self, index: i64) -> Result<Crop> {
        let _guard = self.file.lock().await;
        let mut crops = self.file.load().await;

        let idx = usize::try_from(index)
            .ok()
            .filter(|i| *i < crops.len())
            .ok_or_else(|| AppError::NotFound("Invalid crop index".to_string()))?;
        let removed = crops.remove(idx);
        self.file.save(&crops).await?;

        info!("Deleted crop {} from plot {}", removed.crop, removed.plot);
        Ok(removed)
    }

    /// Newest first.
    pub async fn list(&self) -> Vec<Crop> {
        let mut crops = self.file.load().await;
        crops.reverse();
        crops
    }
}
