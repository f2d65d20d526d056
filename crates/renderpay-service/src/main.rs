//! Renderpay Service - HTTP API for metered generation jobs.
//!
//! This is the main entry point for the renderpay service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renderpay_service::{create_router, AppState, ServiceConfig};
use renderpay_store::RocksLedger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,renderpay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Renderpay Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        executor_url = %config.executor_url,
        executor_timeout_seconds = %config.executor_timeout_seconds,
        stager_configured = %config.stager_url.is_some(),
        models = %config.catalog.models.len(),
        "Service configuration loaded"
    );

    if config.executor_secret.is_empty() {
        tracing::warn!("EXECUTOR_SECRET is empty; executor requests will be signed with an empty key");
    }

    // Initialize RocksDB ledger store
    tracing::info!(path = %config.data_dir, "Opening RocksDB ledger");
    let store = Arc::new(RocksLedger::open(&config.data_dir)?);

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
