use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::JsonFile;
use crate::error::{AppError, Result};

pub const DEFAULT_FIELD: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilReport {
    pub ph: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub moisture: f64,
    pub soil_type: String,
    pub last_tested: String,
}

/// Lab values for a new report; missing readings take neutral defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct SoilSample {
    #[serde(default = "neutral_ph")]
    pub ph: f64,
    #[serde(default)]
    pub nitrogen: f64,
    #[serde(default)]
    pub phosphorus: f64,
    #[serde(default)]
    pub potassium: f64,
    #[serde(default)]
    pub moisture: f64,
    #[serde(default = "loam")]
    pub soil_type: String,
}

fn neutral_ph() -> f64 {
    7.0
}

fn loam() -> String {
    "Loam".to_string()
}

impl Default for SoilSample {
    fn default() -> Self {
        Self {
            ph: neutral_ph(),
            nitrogen: 0.0,
            phosphorus: 0.0,
            potassium: 0.0,
            moisture: 0.0,
            soil_type: loam(),
        }
    }
}

pub struct SoilRegistry {
    file: JsonFile<BTreeMap<String, SoilReport>>,
}

impl SoilRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// Report for `field`, else the `default` field's report.
    pub async fn get(&self, field: &str) -> Result<SoilReport> {
        let mut reports = self.file.load().await;
        reports
            .remove(field)
            .or_else(|| reports.remove(DEFAULT_FIELD))
            .ok_or_else(|| AppError::NotFound("No soil data".to_string()))
    }

    /// Replaces the report for `field`, stamped with today's date.
    pub async fn add(&self, field: &str, sample: SoilSample) -> Result<SoilReport> {
        let _guard = self.file.lock().await;
        let mut reports = self.file.load().await;

        let report = SoilReport {
            ph: sample.ph,
            nitrogen: sample.nitrogen,
            phosphorus: sample.phosphorus,
            potassium: sample.potassium,
            moisture: sample.moisture,
            soil_type: sample.soil_type,
            last_tested: Local::now().format("%d %b %Y").to_string(),
        };
        reports.insert(field.to_string(), report.clone());
        self.file.save(&reports).await?;

        info!("Saved soil report for field {}", field);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_field_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let soil = SoilRegistry::new(dir.path().join("soil.json"));
        soil.add(DEFAULT_FIELD, SoilSample { ph: 6.5, ..SoilSample::default() }).await.unwrap();
        soil.add("east", SoilSample { nitrogen: 40.0, ..SoilSample::default() }).await.unwrap();

        assert_eq!(soil.get("east").await.unwrap().nitrogen, 40.0);
        assert_eq!(soil.get("west").await.unwrap().ph, 6.5);
    }

    #[tokio::test]
    async fn empty_registry_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let soil = SoilRegistry::new(dir.path().join("soil.json"));
        assert!(matches!(soil.get("east").await, Err(AppError::NotFound(_))));
    }

    #[test]
    fn sample_defaults_apply_to_missing_readings() {
        let sample: SoilSample = serde_json::from_str(r#"{"nitrogen": 12}"#).unwrap();
        assert_eq!(sample.ph, 7.0);
        assert_eq!(sample.nitrogen, 12.0);
        assert_eq!(sample.soil_type, "Loam");
    }

    #[tokio::test]
    async fn adding_again_overwrites_field() {
        let dir = tempfile::tempdir().unwrap();
        let soil = SoilRegistry::new(dir.path().join("soil.json"));
        soil.add("north", SoilSample { moisture: 10.0, ..SoilSample::default() }).await.unwrap();
        soil.add("north", SoilSample { moisture: 30.0, ..SoilSample::default() }).await.unwrap();

        assert_eq!(soil.get("north").await.unwrap().moisture, 30.0);
    }
}
