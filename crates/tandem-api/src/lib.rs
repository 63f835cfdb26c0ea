//! Tandem API
//!
//! HTTP surface for buddy lists and mutual-buddy queries. The store is
//! opened at startup, shared through the router state, and closed again
//! once the server has shut down.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod service;
pub mod session;

use config::ServerConfig;
use handlers::{create_router, AppState};
use session::SessionManager;
use std::sync::Arc;
use tandem_store::{SqliteStore, StoreError};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Store could not be opened or closed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this more
/// than once keeps the first subscriber.
pub fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Start the API HTTP server
///
/// Opens the store, serves until Ctrl+C, then closes the store.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    init_tracing(&config);

    info!("Starting Tandem API");
    info!("Bind address: {}", config.bind_addr());
    info!("Database: {}", config.database_path);
    info!("Request deadline: {:?}", config.request_timeout());

    let store = SqliteStore::open(&config.database_path)?;
    let session_manager = SessionManager::new(&config.jwt_secret, config.token_expiry_secs);
    let state = AppState::new(store, session_manager, config.request_timeout());
    let store = Arc::clone(&state.store);

    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("API listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Server stopped, closing store");
    match Arc::try_unwrap(store) {
        Ok(mutex) => mutex
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .close()?,
        Err(_) => warn!("Store still in use at shutdown; leaving connection to be dropped"),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config() {
        let config = ServerConfig::default_dev_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.token_expiry_secs, 3600);
    }

    #[test]
    fn test_init_tracing_twice() {
        let config = ServerConfig::default_dev_config();
        init_tracing(&config);
        init_tracing(&config);
    }
}
