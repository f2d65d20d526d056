//! Service configuration.

use std::path::Path;

use renderpay_core::ModelCatalog;

/// Default executor call ceiling: long enough for a synchronous video
/// render, short enough that a wedged backend cannot hold a debit open
/// indefinitely.
const DEFAULT_EXECUTOR_TIMEOUT_SECONDS: u64 = 300;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/renderpay").
    pub data_dir: String,

    /// Generation executor endpoint URL.
    pub executor_url: String,

    /// Shared secret for signing executor requests.
    pub executor_secret: String,

    /// Executor call timeout in seconds.
    pub executor_timeout_seconds: u64,

    /// Blob stager presign endpoint URL (optional; absent means input paths
    /// are passed through unmodified, for local setups).
    pub stager_url: Option<String>,

    /// Service API key the gateway authenticates with.
    pub service_api_key: Option<String>,

    /// Admin API key for privileged endpoints (top-up).
    pub admin_api_key: Option<String>,

    /// Largest client-specified batch count a model may permit.
    pub max_batch_count: u32,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// The model catalog.
    pub catalog: ModelCatalog,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// The model catalog is loaded from the JSON file named by
    /// `CATALOG_PATH` when set and readable, otherwise the built-in catalog
    /// is used.
    #[must_use]
    pub fn from_env() -> Self {
        let catalog = std::env::var("CATALOG_PATH")
            .ok()
            .and_then(|path| load_catalog_file(&path))
            .unwrap_or_default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/renderpay".into()),
            executor_url: std::env::var("EXECUTOR_URL")
                .unwrap_or_else(|_| "http://localhost:9090/generate".into()),
            executor_secret: std::env::var("EXECUTOR_SECRET").unwrap_or_default(),
            executor_timeout_seconds: std::env::var("EXECUTOR_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_EXECUTOR_TIMEOUT_SECONDS),
            stager_url: std::env::var("STAGER_URL").ok(),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            max_batch_count: std::env::var("MAX_BATCH_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(6),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            catalog,
        }
    }
}

/// Load a model catalog from a JSON file.
fn load_catalog_file(path: &str) -> Option<ModelCatalog> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Catalog file not found, using built-in catalog");
        return None;
    }
    match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|contents| serde_json::from_str(&contents).map_err(|e| e.to_string()))
    {
        Ok(catalog) => {
            tracing::info!(path = %path.display(), "Loaded model catalog from file");
            Some(catalog)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load catalog file");
            None
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/renderpay".into(),
            executor_url: "http://localhost:9090/generate".into(),
            executor_secret: String::new(),
            executor_timeout_seconds: DEFAULT_EXECUTOR_TIMEOUT_SECONDS,
            stager_url: None,
            service_api_key: None,
            admin_api_key: None,
            max_batch_count: 6,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            catalog: ModelCatalog::default(),
        }
    }
}
