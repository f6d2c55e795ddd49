//! coinproxy - Caching proxy for CoinMarketCap market data
//!
//! An HTTP server that forwards market data requests to CoinMarketCap and keeps
//! each response in memory for a fixed TTL.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinproxy::cache::CacheStore;
use coinproxy::cli::{Cli, ProxyConfig};
use coinproxy::data::CoinMarketCapClient;
use coinproxy::server::{self, AppState};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_LOG_DIRECTIVES: &str = "coinproxy=info,tower_http=info";

/// Installs the global tracing subscriber, honoring `RUST_LOG` when set
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = ProxyConfig::from_cli(&cli)?;

    // One cache per process, shared by every endpoint
    let cache = Arc::new(CacheStore::new(config.cache_ttl));
    info!(
        base_url = %config.base_url,
        cache_ttl_secs = cache.ttl().as_secs(),
        "Starting coinproxy"
    );

    let client = CoinMarketCapClient::from_config(&config, cache)?;
    let router = server::build_router(AppState::new(client));

    let listener = TcpListener::bind(config.bind_address)
        .await
        .map_err(|e| format!("Failed to bind to {}: {e}", config.bind_address))?;

    server::serve(listener, router, server::shutdown_signal()).await?;

    Ok(())
}
