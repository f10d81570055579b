//! Mandi prices from the data.gov.in Agmarknet resource.

use std::path::PathBuf;

use chrono::{Duration, Local};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::{normalize, read_records, HTTP};
use crate::error::{AppError, Result};

const AGMARKNET_URL: &str = "https://api.data.gov.in/resource/35985678-0d79-46b4-9ed6-6f13308a1d24";
const HISTORY_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Api,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReport {
    pub crop: String,
    pub state: String,
    pub district: Option<String>,
    pub market: Option<String>,
    pub modal_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub arrival_date: Option<String>,
    pub variety: Option<String>,
    #[serde(default)]
    pub history: Vec<PricePoint>,
    pub source: PriceSource,
}

/// A price row as stored by Agmarknet or in `prices.json`. Prices arrive as
/// either strings or numbers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceRecord {
    #[serde(default, alias = "commodity")]
    pub crop: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub modal_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub min_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_price")]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub arrival_date: Option<String>,
    #[serde(default)]
    pub variety: Option<String>,
}

#[derive(Deserialize)]
struct AgmarknetResponse {
    #[serde(default)]
    records: Vec<PriceRecord>,
}

fn lenient_price<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

impl PriceRecord {
    fn into_report(self, crop: &str, state: &str, source: PriceSource) -> PriceReport {
        PriceReport {
            crop: self.crop.unwrap_or_else(|| crop.to_string()),
            state: self.state.unwrap_or_else(|| state.to_string()),
            district: self.district,
            market: self.market,
            modal_price: self.modal_price,
            min_price: self.min_price,
            max_price: self.max_price,
            arrival_date: self.arrival_date,
            variety: self.variety,
            history: Vec::new(),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketClient {
    api_key: String,
    local_path: PathBuf,
}

impl MarketClient {
    pub fn new(api_key: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key: api_key.into(),
            local_path: data_dir.into().join("prices.json"),
        }
    }

    pub fn cache_key(crop: &str, state: &str) -> String {
        format!("price:{}:{}", normalize(crop), normalize(state))
    }

    /// Latest mandi price for `crop` in `state`, falling back to
    /// `prices.json` when the API is unreachable or has no rows.
    pub async fn fetch(&self, crop: &str, state: &str) -> Result<PriceReport> {
        let remote = if self.api_key.is_empty() {
            Err(AppError::ConfigError("Missing DATA_GOV_API_KEY".to_string()))
        } else {
            self.fetch_remote(crop, state).await
        };

        match remote {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("Market price API failed for {} in {}: {}", crop, state, err);
                match self.local(crop, state).await {
                    Some(report) => {
                        debug!("Serving local price for {}", crop);
                        Ok(report)
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn fetch_remote(&self, crop: &str, state: &str) -> Result<PriceReport> {
        let response = HTTP
            .get(AGMARKNET_URL)
            .query(&[
                ("api-key", self.api_key.as_str()),
                ("format", "json"),
                ("filters[Commodity]", crop),
                ("filters[State]", state),
                ("limit", "5"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!(
                "API returned status code {}",
                status.as_u16()
            )));
        }

        let payload: AgmarknetResponse = response.json().await?;
        let record = payload.records.into_iter().next().ok_or_else(|| {
            AppError::NotFound("No data found for the given commodity and state".to_string())
        })?;

        // The request names the crop and state; keep them over the row's casing.
        let mut report = PriceRecord {
            crop: None,
            state: None,
            ..record
        }
        .into_report(crop, state, PriceSource::Api);
        if let Some(modal) = report.modal_price {
            report.history = simulated_history(modal);
        }
        Ok(report)
    }

    async fn local(&self, crop: &str, state: &str) -> Option<PriceReport> {
        let records: Vec<PriceRecord> = read_records(&self.local_path).await?;
        find_local_price(&records, crop, state)
    }
}

/// Crop match (optionally narrowed by state), then a substring crop match.
pub fn find_local_price(records: &[PriceRecord], crop: &str, state: &str) -> Option<PriceReport> {
    let crop_l = normalize(crop);
    let state_l = normalize(state);
    let field = |value: &Option<String>| value.as_deref().map(normalize).unwrap_or_default();

    let mut candidates: Vec<&PriceRecord> = records.iter().filter(|r| field(&r.crop) == crop_l).collect();
    if !state_l.is_empty() {
        let in_state: Vec<&PriceRecord> = candidates
            .iter()
            .copied()
            .filter(|r| field(&r.state) == state_l)
            .collect();
        if !in_state.is_empty() {
            candidates = in_state;
        }
    }
    if candidates.is_empty() && !crop_l.is_empty() {
        candidates = records.iter().filter(|r| field(&r.crop).contains(&crop_l)).collect();
    }

    candidates
        .first()
        .map(|r| (*r).clone().into_report(crop, state, PriceSource::Local))
}

/// Seven daily points, oldest first, within ±10% of `modal`.
pub fn simulated_history(modal: f64) -> Vec<PricePoint> {
    let mut rng = rand::thread_rng();
    let today = Local::now();

    (0..HISTORY_DAYS)
        .rev()
        .map(|days_ago| PricePoint {
            date: (today - Duration::days(days_ago)).format("%d %b").to_string(),
            price: (modal * (1.0 + rng.gen_range(-0.1..0.1))) as i64,
        })
        .collect()
}
