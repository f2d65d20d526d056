//! Account and job lookup handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renderpay_core::{Account, Job, JobId};

use crate::auth::GatewayAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Account view returned to the gateway.
#[derive(Debug, Serialize)]
pub struct AccountView {
    /// Stable external identity.
    pub external_id: String,
    /// Cash balance in cents.
    pub balance_cents: i64,
    /// Promo credits (whole free generations).
    pub promo_credits: i64,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            external_id: account.external_id,
            balance_cents: account.cash_balance_cents,
            promo_credits: account.promo_credits,
            created_at: account.created_at,
        }
    }
}

/// Job view returned to the gateway.
#[derive(Debug, Serialize)]
pub struct JobView {
    /// Job id.
    pub id: String,
    /// Model id.
    pub model: String,
    /// Terminal or in-flight status.
    pub status: String,
    /// Number of units in the batch.
    pub unit_count: u32,
    /// Total charge in credit cents (0 when fully promo-covered).
    pub cost: i64,
    /// Promo credits consumed by the debit.
    pub promo_credits_consumed: i64,
    /// Output URL once succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Failure detail once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id.to_string(),
            model: job.model_id,
            status: job.status.as_str().to_string(),
            unit_count: job.unit_count,
            cost: job.cost_cents,
            promo_credits_consumed: job.promo_credits_consumed,
            output_url: job.output_url,
            error_detail: job.error_detail,
            created_at: job.created_at,
            finished_at: job.finished_at,
        }
    }
}

/// `POST /v1/accounts`
///
/// Idempotent: returns the existing account when one already exists for
/// the forwarded external identity.
pub async fn register_account(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
) -> Result<Json<AccountView>, ApiError> {
    let account = state.store.get_or_create_account(&auth.external_id)?;
    tracing::debug!(external_id = %account.external_id, "Account resolved");
    Ok(Json(account.into()))
}

/// `GET /v1/accounts/me`
pub async fn get_my_account(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
) -> Result<Json<AccountView>, ApiError> {
    let account = state
        .store
        .get_account_by_external_id(&auth.external_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", auth.external_id)))?;
    Ok(Json(account.into()))
}

/// Query parameters for the job listing.
#[derive(Debug, Deserialize)]
pub struct JobsQuery {
    /// Page size, capped at 200.
    pub limit: Option<usize>,
    /// Number of jobs to skip.
    pub offset: Option<usize>,
}

/// Job listing response.
#[derive(Debug, Serialize)]
pub struct JobsResponse {
    /// Jobs, newest first.
    pub jobs: Vec<JobView>,
}

/// `GET /v1/jobs`
pub async fn list_my_jobs(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
    Query(query): Query<JobsQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let account = state
        .store
        .get_account_by_external_id(&auth.external_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", auth.external_id)))?;

    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let jobs = state
        .store
        .list_jobs_for_account(&account.id, limit, offset)?;

    Ok(Json(JobsResponse {
        jobs: jobs.into_iter().map(JobView::from).collect(),
    }))
}

/// `GET /v1/jobs/:id`
///
/// Only the owning account can read a job.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
    Path(job_id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("job not found: {job_id}")))?;

    let job = state
        .store
        .get_job(&job_id)?
        .ok_or_else(|| ApiError::NotFound(format!("job not found: {job_id}")))?;

    let account = state
        .store
        .get_account_by_external_id(&auth.external_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", auth.external_id)))?;

    if job.account_id != account.id {
        return Err(ApiError::NotFound(format!("job not found: {job_id}")));
    }

    Ok(Json(job.into()))
}
