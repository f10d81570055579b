use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use farm_assistant::{
    api::routes::create_router,
    cache::{FileStore, ResponseCache},
    config::Config,
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "farm_assistant=info,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;
    info!(
        "Weather TTL {:?}, price TTL {:?}, data dir {}",
        config.weather_ttl,
        config.price_ttl,
        config.data_dir.display()
    );
    if config.openrouter_api_key.is_none() {
        info!("OPENROUTER_API_KEY not set, chatbot runs in offline mode");
    }

    // Responses persist across restarts in the data directory.
    let cache_path = config.data_dir.join("cache.json");
    let store = FileStore::open(&cache_path).await;
    info!("Response cache at {}", cache_path.display());
    let cache = ResponseCache::new(Arc::new(store));

    let app = create_router(AppState::new(config, cache));

    let listener = TcpListener::bind(server_addr).await?;
    info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
