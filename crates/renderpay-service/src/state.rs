//! Application state.

use std::sync::Arc;
use std::time::Duration;

use renderpay_executor::ExecutorClient;
use renderpay_store::LedgerStore;

use crate::config::ServiceConfig;
use crate::stager::{BlobStager, DirectStager, HttpStager};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The ledger store.
    pub store: Arc<dyn LedgerStore>,

    /// Service configuration (including the model catalog).
    pub config: ServiceConfig,

    /// Executor adapter.
    pub executor: Arc<ExecutorClient>,

    /// Blob stager for input URLs.
    pub stager: Arc<dyn BlobStager>,
}

impl AppState {
    /// Create application state from config, wiring the executor and stager
    /// from their configured endpoints.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, config: ServiceConfig) -> Self {
        let executor = Arc::new(ExecutorClient::new(
            config.executor_url.clone(),
            config.executor_secret.clone(),
            Duration::from_secs(config.executor_timeout_seconds),
        ));

        let stager: Arc<dyn BlobStager> = match &config.stager_url {
            Some(url) => {
                tracing::info!(stager_url = %url, "Blob stager configured");
                Arc::new(HttpStager::new(url.clone()))
            }
            None => {
                tracing::warn!("No blob stager configured - input paths pass through unsigned");
                Arc::new(DirectStager)
            }
        };

        Self {
            store,
            config,
            executor,
            stager,
        }
    }

    /// Create application state with explicit collaborators (used by tests).
    #[must_use]
    pub fn with_parts(
        store: Arc<dyn LedgerStore>,
        config: ServiceConfig,
        executor: Arc<ExecutorClient>,
        stager: Arc<dyn BlobStager>,
    ) -> Self {
        Self {
            store,
            config,
            executor,
            stager,
        }
    }
}
