//! statskv Server - keeps one bot stats record in a key-value store
//!
//! `POST` with a valid `API-KEY` header merges guild/channel/member totals
//! into the stored record, `GET` returns the stored record as-is.

mod error;
mod handler;
mod response;
mod server;
mod store;

use anyhow::{Context, Result};
use statskv_common::StatsConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use store::KvStore;
use tracing::{error, info};

/// Everything a request needs; built once at startup
pub struct AppState {
    pub api_key: String,
    pub store: Arc<dyn KvStore>,
    pub access_log: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("statskv_server=info".parse()?),
        )
        .init();

    info!("Starting statskv v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("statskv.toml"));

    // Load or create default configuration
    let config = if config_path.exists() {
        info!("Loading configuration from {}", config_path.display());
        StatsConfig::load(&config_path)?
    } else {
        info!("No configuration file found, using defaults");
        let config = StatsConfig::default();
        // Save default config for reference
        if let Err(e) = config.save(&config_path) {
            error!("Failed to save default config: {}", e);
        }
        config
    };
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", config_path.display()))?;

    let store = store::open_store(&config.store).await?;
    info!("Using {} store", store.backend_name());

    if config.store.seed_on_empty {
        store::seed_stats(store.as_ref()).await?;
    }

    let addr: SocketAddr =
        format!("{}:{}", config.server.bind_address, config.server.port).parse()?;

    let state = Arc::new(AppState {
        api_key: config.api_key,
        store,
        access_log: config.server.access_log,
    });

    // Start HTTP server
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server::run_server(state, addr).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            if let Err(e) = result {
                error!("Server task failed: {}", e);
            }
        }
    }

    info!("statskv shutdown complete");
    Ok(())
}
