//! Typed clients for the external data sources, each with a local JSON
//! fallback under the data directory.

pub mod market;
pub mod weather;

use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use tracing::warn;

pub use market::{MarketClient, PricePoint, PriceReport, PriceSource};
pub use weather::{WeatherClient, WeatherReport};

// Create a static client to reuse connections
pub(crate) static HTTP: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            Client::new()
        })
});

/// Reads a JSON array of records. Missing or malformed files yield `None`.
pub(crate) async fn read_records<T: DeserializeOwned>(path: &Path) -> Option<Vec<T>> {
    let bytes = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(records) => Some(records),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}
