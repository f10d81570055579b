use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-8b-instruct:free";
const DEFAULT_DATA_GOV_KEY: &str = "579b464db66ec23bdd000001cdd3946e44ce4aad7209ff7b23ac571b";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub openrouter_api_key: Option<String>,
    pub llm_model: String,
    pub openweather_key: Option<String>,
    pub data_gov_api_key: String,
    pub data_dir: PathBuf,
    pub default_state: String,
    pub weather_ttl: Duration,
    pub price_ttl: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "9000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            openrouter_api_key: optional("OPENROUTER_API_KEY"),
            llm_model: env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            openweather_key: optional("OPENWEATHER_KEY"),
            data_gov_api_key: env::var("DATA_GOV_API_KEY").unwrap_or_else(|_| DEFAULT_DATA_GOV_KEY.to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            default_state: env::var("DEFAULT_STATE").unwrap_or_else(|_| "Maharashtra".to_string()),
            weather_ttl: seconds("WEATHER_TTL_SECS", 600)?,
            price_ttl: seconds("PRICE_TTL_SECS", 3600)?,
            request_timeout: seconds("REQUEST_TIMEOUT_SECS", 30)?,
        })
    }

    /// Offline configuration rooted at `data_dir`: no API keys, so every
    /// external source answers from local files or the mock LLM.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            openrouter_api_key: None,
            llm_model: DEFAULT_MODEL.to_string(),
            openweather_key: None,
            data_gov_api_key: String::new(),
            data_dir: data_dir.into(),
            default_state: "Maharashtra".to_string(),
            weather_ttl: Duration::from_secs(600),
            price_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn seconds(key: &str, default: u64) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
