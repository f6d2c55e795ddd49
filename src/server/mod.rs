//! HTTP server exposing the cached market data routes
//!
//! Builds the axum router, attaches CORS and request tracing, and runs it with
//! graceful shutdown.

mod routes;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::data::CoinMarketCapClient;

pub use routes::ApiError;

/// Path prefix the market data routes are mounted under
pub const API_PREFIX: &str = "/api/coins";

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub client: Arc<CoinMarketCapClient>,
}

impl AppState {
    pub fn new(client: CoinMarketCapClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Builds the application router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, routes::coin_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("coinproxy listening on http://{addr}{API_PREFIX}");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("coinproxy stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, stopping server...");
}
