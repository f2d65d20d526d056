//! Credit history and top-up handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use renderpay_core::LedgerEntry;

use crate::auth::{AdminAuth, GatewayAuth};
use crate::error::ApiError;
use crate::handlers::accounts::AccountView;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// Query parameters for the entries listing.
#[derive(Debug, Deserialize)]
pub struct EntriesQuery {
    /// Page size, capped at [`MAX_PAGE_SIZE`].
    pub limit: Option<usize>,
    /// Number of entries to skip.
    pub offset: Option<usize>,
}

/// One ledger entry as exposed over the API.
#[derive(Debug, Serialize)]
pub struct EntryView {
    /// Entry id.
    pub id: String,
    /// Entry kind: `debit`, `refund` or `topup`.
    pub entry_type: String,
    /// Signed amount in cents (negative for debits).
    pub amount_cents: i64,
    /// Cash balance after this entry was applied.
    pub balance_after_cents: i64,
    /// The job this entry belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl From<LedgerEntry> for EntryView {
    fn from(entry: LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            entry_type: entry.entry_type.as_str().to_string(),
            amount_cents: entry.amount_cents,
            balance_after_cents: entry.balance_after_cents,
            job_id: entry.job_id.map(|id| id.to_string()),
            created_at: entry.created_at,
        }
    }
}

/// Entries listing response.
#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    /// Entries, newest first.
    pub entries: Vec<EntryView>,
}

/// `GET /v1/credits/entries`
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    auth: GatewayAuth,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let account = state
        .store
        .get_account_by_external_id(&auth.external_id)?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {}", auth.external_id)))?;

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0);

    let entries = state
        .store
        .list_entries_for_account(&account.id, limit, offset)?;

    Ok(Json(EntriesResponse {
        entries: entries.into_iter().map(EntryView::from).collect(),
    }))
}

/// Admin top-up request body.
#[derive(Debug, Deserialize)]
pub struct TopupRequest {
    /// External identity of the account to credit.
    pub external_id: String,
    /// Cash to add, in cents.
    #[serde(default)]
    pub amount_cents: i64,
    /// Promo credits to add.
    #[serde(default)]
    pub promo_credits: i64,
    /// Free-form metadata recorded on the ledger entry (payment
    /// reference, campaign tag).
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// `POST /v1/credits/topup`
///
/// Admin-only: credits cash and/or promo credits and appends a `topup`
/// ledger entry.
pub async fn top_up(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(request): Json<TopupRequest>,
) -> Result<Json<AccountView>, ApiError> {
    if request.amount_cents < 0 || request.promo_credits < 0 {
        return Err(ApiError::BadRequest(
            "top-up amounts must be non-negative".into(),
        ));
    }
    if request.amount_cents == 0 && request.promo_credits == 0 {
        return Err(ApiError::BadRequest("nothing to credit".into()));
    }

    let account = state.store.top_up(
        &request.external_id,
        request.amount_cents,
        request.promo_credits,
        request.meta,
    )?;

    tracing::info!(
        external_id = %account.external_id,
        amount_cents = %request.amount_cents,
        promo_credits = %request.promo_credits,
        "Account topped up"
    );

    Ok(Json(account.into()))
}
