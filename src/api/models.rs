use serde::{Deserialize, Serialize};

use crate::farm::{Crop, FinanceSummary, SoilSample};
use crate::insight::InsightView;
use crate::sources::{PriceReport, WeatherReport};

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub city: String,
}

#[derive(Deserialize)]
pub struct PriceQuery {
    pub crop: String,
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct SoilQuery {
    pub field: Option<String>,
}

#[derive(Deserialize)]
pub struct SoilRequest {
    pub field: Option<String>,
    #[serde(flatten)]
    pub sample: SoilSample,
}

#[derive(Deserialize)]
pub struct ExpenseQuery {
    pub title: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
}

#[derive(Deserialize)]
pub struct AddCropRequest {
    pub crop: Option<String>,
    pub plot: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteCropRequest {
    pub index: Option<i64>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub city: Option<String>,
    pub crop: Option<String>,
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// A dashboard panel: either the data or the reason it is missing.
#[derive(Serialize)]
#[serde(untagged)]
pub enum Section<T> {
    Ready {
        #[serde(flatten)]
        data: T,
        stale: bool,
    },
    Failed {
        error: String,
    },
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub weather: Section<WeatherReport>,
    pub price: Section<PriceReport>,
    pub crop_count: usize,
    pub crops: Vec<Crop>,
    pub financials: FinanceSummary,
}

#[derive(Serialize)]
pub struct InsightResponse {
    pub insight: String,
    pub view: InsightView,
}
