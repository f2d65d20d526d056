//! Account and credit endpoint integration tests.

mod common;

use common::{TestHarness, ADMIN_API_KEY, SERVICE_API_KEY};
use serde_json::json;

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn health_is_public() {
    let harness = TestHarness::new().await;

    let response = harness.server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn register_account_is_idempotent() {
    let harness = TestHarness::new().await;

    let first = harness
        .server
        .post("/v1/accounts")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", harness.external_id.as_str())
        .await;
    first.assert_status_ok();
    let first: serde_json::Value = first.json();
    assert_eq!(first["external_id"], harness.external_id.as_str());
    assert_eq!(first["balance_cents"], 0);
    assert_eq!(first["promo_credits"], 0);

    let second = harness
        .server
        .post("/v1/accounts")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", harness.external_id.as_str())
        .await;
    second.assert_status_ok();
    let second: serde_json::Value = second.json();
    assert_eq!(second["created_at"], first["created_at"]);
}

#[tokio::test]
async fn get_my_account_before_registration_is_not_found() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/v1/accounts/me")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", "tg:never-seen")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn accounts_require_gateway_key() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/v1/accounts")
        .add_header("x-external-id", harness.external_id.as_str())
        .await
        .assert_status_unauthorized();

    harness
        .server
        .post("/v1/accounts")
        .add_header("x-api-key", "wrong-key")
        .add_header("x-external-id", harness.external_id.as_str())
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn missing_external_id_is_unauthorized() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/v1/accounts")
        .add_header("x-api-key", SERVICE_API_KEY)
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Top-ups
// ============================================================================

#[tokio::test]
async fn topup_credits_cash_and_promo() {
    let harness = TestHarness::new().await;
    harness.fund(500, 3).await;

    let account = harness
        .server
        .get("/v1/accounts/me")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", harness.external_id.as_str())
        .await;
    account.assert_status_ok();
    let account: serde_json::Value = account.json();
    assert_eq!(account["balance_cents"], 500);
    assert_eq!(account["promo_credits"], 3);
}

#[tokio::test]
async fn topup_requires_admin_key() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/v1/credits/topup")
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({
            "external_id": harness.external_id,
            "amount_cents": 100
        }))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn topup_rejects_negative_and_empty_amounts() {
    let harness = TestHarness::new().await;
    harness.fund(0, 0).await;

    harness
        .server
        .post("/v1/credits/topup")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "external_id": harness.external_id,
            "amount_cents": -50
        }))
        .await
        .assert_status_bad_request();

    harness
        .server
        .post("/v1/credits/topup")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "external_id": harness.external_id
        }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn topup_for_unknown_account_is_not_found() {
    let harness = TestHarness::new().await;

    harness
        .server
        .post("/v1/credits/topup")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .json(&json!({
            "external_id": "tg:ghost",
            "amount_cents": 100
        }))
        .await
        .assert_status_not_found();
}

// ============================================================================
// Entries
// ============================================================================

#[tokio::test]
async fn entries_are_paginated() {
    let harness = TestHarness::new().await;
    harness.fund(100, 0).await;

    for _ in 0..3 {
        harness
            .server
            .post("/v1/credits/topup")
            .add_header("x-admin-key", ADMIN_API_KEY)
            .json(&json!({
                "external_id": harness.external_id,
                "amount_cents": 10
            }))
            .await
            .assert_status_ok();
    }

    let page = harness
        .server
        .get("/v1/credits/entries?limit=2")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", harness.external_id.as_str())
        .await;
    page.assert_status_ok();
    let page: serde_json::Value = page.json();
    assert_eq!(page["entries"].as_array().unwrap().len(), 2);

    let rest = harness
        .server
        .get("/v1/credits/entries?limit=10&offset=2")
        .add_header("x-api-key", SERVICE_API_KEY)
        .add_header("x-external-id", harness.external_id.as_str())
        .await;
    let rest: serde_json::Value = rest.json();
    assert_eq!(rest["entries"].as_array().unwrap().len(), 2);
}
