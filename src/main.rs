//! # Service Sentinel - Main Server
//!
//! Entry point for the autonomous reliability analyzer.
//!
//! This server continuously ingests service telemetry and cluster events,
//! persists them, and periodically diagnoses each service with a fleet of
//! statistical detectors, exposing the results over a thin HTTP API.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use service_sentinel::infrastructure::store::{MemoryStore, MetricStore, SqliteStore};
use service_sentinel::server::{build_router, start_background_tasks, AppState};
use service_sentinel::utils::config::SentinelConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(SentinelConfig::load()?);
    init_logging(&config);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting service sentinel"
    );

    let store: Arc<dyn MetricStore> = if config.store.database_path == ":memory:" {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::open(config.store.database_path.clone().into()).await?)
    };

    let state = AppState::new(store, Arc::clone(&config));
    start_background_tasks(&state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP surface listening");
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

fn init_logging(config: &SentinelConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
