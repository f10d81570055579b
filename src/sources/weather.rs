use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{normalize, read_records, HTTP};
use crate::error::{AppError, Result};

const OPENWEATHER_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub temp: f64,
    pub humidity: f64,
    pub weather: String,
}

#[derive(Deserialize)]
struct OpenWeatherResponse {
    #[serde(default)]
    cod: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
    main: Option<OpenWeatherMain>,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
}

#[derive(Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

impl OpenWeatherResponse {
    fn is_ok(&self) -> bool {
        match &self.cod {
            serde_json::Value::Number(n) => n.as_u64() == Some(200),
            serde_json::Value::String(s) => s == "200",
            _ => false,
        }
    }

    fn into_report(self, city: &str) -> Result<WeatherReport> {
        let main = self
            .main
            .ok_or_else(|| AppError::ParseError("weather response has no main block".to_string()))?;
        let weather = self
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .ok_or_else(|| AppError::ParseError("weather response has no conditions".to_string()))?;

        Ok(WeatherReport {
            city: city.to_string(),
            temp: main.temp,
            humidity: main.humidity,
            weather,
        })
    }
}

/// OpenWeather client. Without an API key, or when the API fails, reports
/// come from `weather.json` in the data directory.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    api_key: Option<String>,
    local_path: PathBuf,
}

impl WeatherClient {
    pub fn new(api_key: Option<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_key,
            local_path: data_dir.into().join("weather.json"),
        }
    }

    pub fn cache_key(city: &str) -> String {
        format!("weather:{}", normalize(city))
    }

    pub async fn fetch(&self, city: &str) -> Result<WeatherReport> {
        let Some(api_key) = &self.api_key else {
            debug!("No OPENWEATHER_KEY, using local weather for {}", city);
            return self
                .local(city)
                .await
                .ok_or_else(|| AppError::ConfigError("Missing OPENWEATHER_KEY in .env".to_string()));
        };

        match self.fetch_remote(api_key, city).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("Weather API failed for {}: {}", city, err);
                self.local(city).await.ok_or(err)
            }
        }
    }

    async fn fetch_remote(&self, api_key: &str, city: &str) -> Result<WeatherReport> {
        let response = HTTP
            .get(OPENWEATHER_URL)
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?;
        let payload: OpenWeatherResponse = response.json().await?;

        if !payload.is_ok() {
            let message = payload
                .message
                .unwrap_or_else(|| format!("weather API returned cod {}", payload.cod));
            return Err(AppError::FetchError(message));
        }

        payload.into_report(city)
    }

    async fn local(&self, city: &str) -> Option<WeatherReport> {
        let records: Vec<WeatherReport> = read_records(&self.local_path).await?;
        find_local_weather(&records, city)
    }
}

/// Exact city match, then substring match, then a `default`/`pune` entry.
pub fn find_local_weather(records: &[WeatherReport], city: &str) -> Option<WeatherReport> {
    let wanted = normalize(city);

    records
        .iter()
        .find(|r| normalize(&r.city) == wanted)
        .or_else(|| {
            records
                .iter()
                .find(|r| !wanted.is_empty() && normalize(&r.city).contains(&wanted))
        })
        .or_else(|| {
            records
                .iter()
                .find(|r| matches!(normalize(&r.city).as_str(), "default" | "pune"))
        })
        .cloned()
}
