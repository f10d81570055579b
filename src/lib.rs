pub mod api;
pub mod cache;
pub mod chatbot;
pub mod config;
pub mod error;
pub mod farm;
pub mod insight;
pub mod llm;
pub mod sources;
pub mod tools;

use std::sync::Arc;

use cache::{Fetched, ResponseCache};
use config::Config;
use error::Result;
use farm::FarmStore;
use llm::LlmClient;
use sources::{MarketClient, PriceReport, WeatherClient, WeatherReport};

pub const WEATHER_RESOURCE: &str = "weather";
pub const PRICE_RESOURCE: &str = "price";

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: ResponseCache,
    pub weather: Arc<WeatherClient>,
    pub market: Arc<MarketClient>,
    pub llm: Arc<LlmClient>,
    pub farm: Arc<FarmStore>,
}

impl AppState {
    pub fn new(config: Config, cache: ResponseCache) -> Self {
        let weather = WeatherClient::new(config.openweather_key.clone(), &config.data_dir);
        let market = MarketClient::new(config.data_gov_api_key.clone(), &config.data_dir);
        let llm = LlmClient::new(config.openrouter_api_key.clone(), config.llm_model.clone());
        let farm = FarmStore::open(&config.data_dir);

        Self {
            config: Arc::new(config),
            cache,
            weather: Arc::new(weather),
            market: Arc::new(market),
            llm: Arc::new(llm),
            farm: Arc::new(farm),
        }
    }

    /// Cached weather for `city`, or the last weather seen anywhere when the
    /// fetch fails.
    pub async fn weather_for(&self, city: &str) -> Result<Fetched<WeatherReport>> {
        let client = self.weather.clone();
        self.cache
            .fetch_with_fallback(
                WEATHER_RESOURCE,
                &WeatherClient::cache_key(city),
                self.config.weather_ttl,
                || async move { client.fetch(city).await },
            )
            .await
    }

    pub async fn price_for(&self, crop: &str, state: &str) -> Result<Fetched<PriceReport>> {
        let client = self.market.clone();
        self.cache
            .fetch_with_fallback(
                PRICE_RESOURCE,
                &MarketClient::cache_key(crop, state),
                self.config.price_ttl,
                || async move { client.fetch(crop, state).await },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_state(dir: &std::path::Path) -> AppState {
        AppState::new(Config::for_data_dir(dir), ResponseCache::in_memory())
    }

    #[tokio::test]
    async fn weather_is_cached_per_city() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.json");
        std::fs::write(&path, r#"[{"city":"Pune","temp":27.0,"humidity":55,"weather":"haze"}]"#).unwrap();
        let state = offline_state(dir.path());

        let first = state.weather_for("Pune").await.unwrap();
        // Changing the source has no effect while the entry is fresh.
        std::fs::write(&path, r#"[{"city":"Pune","temp":35.0,"humidity":20,"weather":"sunny"}]"#).unwrap();
        let second = state.weather_for("pune").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.into_inner().temp, 27.0);
    }

    #[tokio::test]
    async fn failed_weather_serves_last_known_city() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weather.json");
        std::fs::write(&path, r#"[{"city":"Nagpur","temp":38.0,"humidity":15,"weather":"dry"}]"#).unwrap();
        let state = offline_state(dir.path());

        state.weather_for("Nagpur").await.unwrap();
        std::fs::remove_file(&path).unwrap();

        let fallback = state.weather_for("Pune").await.unwrap();
        assert!(fallback.is_stale());
        assert_eq!(fallback.into_inner().city, "Nagpur");
    }

    #[tokio::test]
    async fn city_named_last_is_fetched_not_read_from_the_fallback_slot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("weather.json"),
            r#"[{"city":"Nagpur","temp":38.0,"humidity":15,"weather":"dry"},
                {"city":"Lastur","temp":22.0,"humidity":70,"weather":"rain"}]"#,
        )
        .unwrap();
        let state = offline_state(dir.path());

        state.weather_for("Nagpur").await.unwrap();
        let last = state.weather_for("Last").await.unwrap();

        assert!(!last.is_stale());
        let report = last.into_inner();
        assert_eq!(report.city, "Lastur");
        assert_eq!(report.temp, 22.0);
    }

    #[tokio::test]
    async fn price_without_any_data_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = offline_state(dir.path());
        assert!(state.price_for("Tomato", "Maharashtra").await.is_err());
    }
}
