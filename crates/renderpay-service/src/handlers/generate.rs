//! Generation endpoint.
//!
//! `POST /v1/generate` runs the whole job saga synchronously: the response
//! carries the terminal job state and the caller's post-settlement balances.
//! Post-debit failures are reported as HTTP 200 with a failure body, since
//! the money movement (debit then refund) completed as designed; only
//! pre-debit rejections map to error statuses.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use renderpay_core::JobInput;

use crate::auth::GatewayAuth;
use crate::error::ApiError;
use crate::handlers::accounts::JobView;
use crate::saga::{self, AdmissionError, JobRequest, SagaReport};
use crate::state::AppState;

/// Generation request body.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Catalog model id.
    pub model: String,
    /// The prompt.
    pub prompt: String,
    /// Model parameters.
    #[serde(default)]
    pub params: BTreeMap<String, serde_json::Value>,
    /// Declared input blobs.
    #[serde(default)]
    pub inputs: Vec<JobInput>,
    /// Batch count (image models only).
    pub count: Option<u32>,
    /// Style preset passed through to the executor.
    pub style: Option<String>,
    /// Whether the prompt was machine-enhanced upstream.
    #[serde(default)]
    pub prompt_ai: bool,
}

/// Balances returned alongside every saga outcome.
#[derive(Debug, Serialize)]
pub struct UserBalances {
    /// Cash balance in credit cents.
    pub balance: i64,
    /// Promo generations remaining.
    pub promo_gen: i64,
}

/// Failure detail for a post-debit failure.
#[derive(Debug, Serialize)]
pub struct GenerateError {
    /// Stable failure code (executor code, `staging_error` or
    /// `settlement_error`).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

/// Generation response body.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// The terminal job.
    pub job: JobView,
    /// Present when the job failed post-debit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<GenerateError>,
    /// Balances after settlement (post-refund on failure).
    pub user: UserBalances,
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::Catalog(e) => e.into(),
            AdmissionError::Ledger(e) => e.into(),
            AdmissionError::InvalidBatchCount { .. } => Self::BadRequest(err.to_string()),
            AdmissionError::Internal(msg) => Self::Internal(msg),
        }
    }
}

/// `POST /v1/generate`
pub async fn generate(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    // Accounts are created lazily on first contact; a debit against an
    // account with zero balances still fails cleanly downstream.
    state.store.get_or_create_account(&auth.external_id)?;

    let report = saga::run_job(
        &state,
        &auth.external_id,
        JobRequest {
            model_id: request.model,
            prompt: request.prompt,
            params: request.params,
            inputs: request.inputs,
            count: request.count,
            style: request.style,
            prompt_ai: request.prompt_ai,
        },
    )
    .await?;

    let response = match report {
        SagaReport::Success {
            job,
            balance_cents,
            promo_credits,
        } => GenerateResponse {
            job: job.into(),
            error: None,
            user: UserBalances {
                balance: balance_cents,
                promo_gen: promo_credits,
            },
        },
        SagaReport::Failure {
            job,
            code,
            message,
            balance_cents,
            promo_credits,
        } => GenerateResponse {
            job: job.into(),
            error: Some(GenerateError { code, message }),
            user: UserBalances {
                balance: balance_cents,
                promo_gen: promo_credits,
            },
        },
    };

    Ok(Json(response))
}
