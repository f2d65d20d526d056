//! Common test utilities for renderpay integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use renderpay_executor::ExecutorClient;
use renderpay_service::{create_router, AppState, BlobStager, ServiceConfig, StageError};
use renderpay_store::RocksLedger;

pub const SERVICE_API_KEY: &str = "test-service-key";
pub const ADMIN_API_KEY: &str = "test-admin-key";
pub const EXECUTOR_SECRET: &str = "test-executor-secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Mock generation executor backend.
    pub executor: MockServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// Default external identity for authenticated requests.
    pub external_id: String,
}

/// Stager that rejects every path, for exercising the post-debit refund
/// path when input staging fails.
struct RejectingStager;

#[async_trait]
impl BlobStager for RejectingStager {
    async fn stage_read_url(&self, path: &str) -> Result<String, StageError> {
        Err(StageError {
            path: path.to_string(),
            message: "presign endpoint unavailable".into(),
        })
    }
}

impl TestHarness {
    /// Create a new test harness with a fresh database and a mock executor.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Create a harness whose blob stager fails every request.
    pub async fn with_failing_stager() -> Self {
        Self::build(Some(Arc::new(RejectingStager))).await
    }

    async fn build(stager: Option<Arc<dyn BlobStager>>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksLedger::open(temp_dir.path()).expect("Failed to open store");

        let executor = MockServer::start().await;

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            executor_url: format!("{}/generate", executor.uri()),
            executor_secret: EXECUTOR_SECRET.into(),
            executor_timeout_seconds: 5,
            stager_url: None,
            service_api_key: Some(SERVICE_API_KEY.into()),
            admin_api_key: Some(ADMIN_API_KEY.into()),
            ..ServiceConfig::default()
        };

        let state = match stager {
            Some(stager) => {
                let executor_client = Arc::new(ExecutorClient::new(
                    config.executor_url.clone(),
                    config.executor_secret.clone(),
                    Duration::from_secs(config.executor_timeout_seconds),
                ));
                AppState::with_parts(Arc::new(store), config, executor_client, stager)
            }
            None => AppState::new(Arc::new(store), config),
        };
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            executor,
            _temp_dir: temp_dir,
            external_id: "tg:1000001".into(),
        }
    }

    /// Credit the default test user via the admin top-up endpoint.
    pub async fn fund(&self, cash_cents: i64, promo_credits: i64) {
        self.fund_user(&self.external_id, cash_cents, promo_credits)
            .await;
    }

    /// Credit an arbitrary user via the admin top-up endpoint.
    pub async fn fund_user(&self, external_id: &str, cash_cents: i64, promo_credits: i64) {
        // The account must exist before it can be credited.
        self.server
            .post("/v1/accounts")
            .add_header("x-api-key", SERVICE_API_KEY)
            .add_header("x-external-id", external_id)
            .await
            .assert_status_ok();

        if cash_cents > 0 || promo_credits > 0 {
            self.server
                .post("/v1/credits/topup")
                .add_header("x-admin-key", ADMIN_API_KEY)
                .json(&json!({
                    "external_id": external_id,
                    "amount_cents": cash_cents,
                    "promo_credits": promo_credits,
                    "meta": {"reason": "test funding"}
                }))
                .await
                .assert_status_ok();
        }
    }

    /// Stub the executor to succeed with the given output URL.
    pub async fn executor_succeeds(&self, output_url: &str) {
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "output_url": output_url
            })))
            .mount(&self.executor)
            .await;
    }

    /// Stub the executor to fail with the given remote error.
    pub async fn executor_fails(&self, code: &str, message: &str) {
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false,
                "error": {"code": code, "message": message}
            })))
            .mount(&self.executor)
            .await;
    }
}
