mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use autotest_common::config::{Config, LogFormat};
use autotest_common::memory::InMemoryStore;
use autotest_common::redis::RedisStore;
use autotest_common::store::AutotestBackend;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn AutotestBackend>,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format);

    info!("Autotest API booting...");

    let in_memory = std::env::args().skip(1).any(|arg| arg == "--memory");
    let backend: Arc<dyn AutotestBackend> = if in_memory {
        warn!("Running against the in-memory store, nothing will be persisted");
        Arc::new(InMemoryStore::new())
    } else {
        let store = RedisStore::connect(&config.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
        info!("Connected to Redis: {}", config.redis_url);
        Arc::new(store)
    };

    let state = Arc::new(AppState { backend });
    let app = routes::routes().with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
