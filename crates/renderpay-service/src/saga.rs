//! The job saga orchestrator.
//!
//! Drives one generation job from admission through settlement:
//!
//! 1. **Admit** - validate against the model catalog and price the request.
//!    Any violation aborts before any ledger mutation.
//! 2. **Debit** - the ledger's atomic debit-and-create-job. On failure no
//!    job row exists and the error is reported directly.
//! 3. **Stage inputs** - obtain signed read URLs. A staging failure is a
//!    post-debit failure: the job settles `failed` and is refunded.
//! 4. **Execute** - exactly one signed, time-bounded executor invocation.
//!    No automatic retry: the remote side may already be mid-render.
//! 5. **Settle** - write the terminal status; on failure paths, refund
//!    before reporting so the caller always sees post-refund balances.
//!
//! Once the debit succeeds the saga is not cancellable: steps 3-5 run on a
//! spawned task, so a caller that disconnects mid-execution never leaves a
//! debited job unreconciled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use renderpay_core::{CatalogError, Job, JobInput, JobType, LedgerError};
use renderpay_executor::{ExecutorClient, JobEnvelope, StagedInput};
use renderpay_store::{DebitRequest, LedgerStore};

use crate::stager::BlobStager;
use crate::state::AppState;

// ============================================================================
// Constants
// ============================================================================

/// Maximum attempts for a settlement write.
///
/// The executor has already run by settlement time; losing the write would
/// risk double-charging on a retry, so transient store errors are retried
/// before the failure is surfaced.
const SETTLE_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff between settlement attempts (doubles each attempt).
const SETTLE_INITIAL_BACKOFF_MS: u64 = 100;

/// Failure code recorded when input staging fails.
const STAGING_ERROR_CODE: &str = "staging_error";

/// Failure code reported when a settlement write could not be persisted.
const SETTLEMENT_ERROR_CODE: &str = "settlement_error";

/// A generation request as admitted by the orchestrator.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Catalog model id.
    pub model_id: String,
    /// The user's prompt.
    pub prompt: String,
    /// Raw parameters, validated during admission.
    pub params: BTreeMap<String, serde_json::Value>,
    /// Declared input blobs.
    pub inputs: Vec<JobInput>,
    /// Client-requested batch count (image models only).
    pub count: Option<u32>,
    /// Optional style preset, passed through to the executor.
    pub style: Option<String>,
    /// Whether the prompt was machine-enhanced upstream.
    pub prompt_ai: bool,
}

/// Errors that abort the saga before any ledger mutation.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// Catalog validation or pricing failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The ledger rejected the debit (no job was created).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The requested batch count is outside the permitted range.
    #[error("invalid count {requested}: this model permits 1..={max}")]
    InvalidBatchCount {
        /// The requested count.
        requested: u32,
        /// The largest permitted count.
        max: u32,
    },

    /// The saga task could not be joined (process-level fault).
    #[error("internal saga error: {0}")]
    Internal(String),
}

/// Terminal report of a completed saga.
#[derive(Debug)]
pub enum SagaReport {
    /// The job succeeded; balances are as captured at debit time.
    Success {
        /// The settled job.
        job: Job,
        /// Cash balance in cents.
        balance_cents: i64,
        /// Promo credits remaining.
        promo_credits: i64,
    },
    /// The job failed post-debit; balances are post-refund.
    Failure {
        /// The settled (or settlement-failed) job.
        job: Job,
        /// Stable failure code.
        code: String,
        /// Human-readable failure detail.
        message: String,
        /// Cash balance in cents after the refund attempt.
        balance_cents: i64,
        /// Promo credits after the refund attempt.
        promo_credits: i64,
    },
}

/// Run one job saga to a terminal state.
///
/// # Errors
///
/// Returns an [`AdmissionError`] only for pre-debit failures (request or
/// funding errors); every post-debit outcome is a [`SagaReport`].
pub async fn run_job(
    state: &AppState,
    external_id: &str,
    request: JobRequest,
) -> Result<SagaReport, AdmissionError> {
    // --- Admit ---------------------------------------------------------
    let validated = state
        .config
        .catalog
        .validate(&request.model_id, &request.params, &request.inputs)?;
    let unit_cost = state.config.catalog.price(&validated)?;
    let unit_count = admit_count(&request, validated.job_type, validated.max_batch, state)?;

    tracing::debug!(
        external_id = %external_id,
        model = %request.model_id,
        unit_cost_cents = %unit_cost,
        unit_count = %unit_count,
        "Request admitted"
    );

    // --- Debit ---------------------------------------------------------
    let debit = state.store.debit_and_create_job(&DebitRequest {
        external_id: external_id.to_string(),
        model_id: validated.model_id.clone(),
        job_type: validated.job_type,
        prompt: request.prompt.clone(),
        params: validated.params.clone(),
        inputs: request.inputs.clone(),
        unit_cost_cents: unit_cost,
        unit_count,
    })?;

    // --- Stage / Execute / Settle --------------------------------------
    // Spawned so a disconnected caller cannot cancel a debited job; the
    // result is persisted regardless of client presence.
    let store = Arc::clone(&state.store);
    let executor = Arc::clone(&state.executor);
    let stager = Arc::clone(&state.stager);
    let external_id = external_id.to_string();
    let style = request.style.clone();
    let prompt_ai = request.prompt_ai;

    let handle = tokio::spawn(async move {
        execute_and_settle(&*store, &executor, &*stager, debit, &external_id, style, prompt_ai)
            .await
    });

    handle
        .await
        .map_err(|e| AdmissionError::Internal(e.to_string()))
}

/// Resolve and bound the unit count for an admitted request.
fn admit_count(
    request: &JobRequest,
    job_type: JobType,
    model_max_batch: u32,
    state: &AppState,
) -> Result<u32, AdmissionError> {
    let Some(requested) = request.count else {
        return Ok(1);
    };
    // Only image models accept client-specified batch counts.
    let max = if job_type == JobType::Image {
        model_max_batch.min(state.config.max_batch_count)
    } else {
        1
    };
    if requested == 0 || requested > max {
        return Err(AdmissionError::InvalidBatchCount { requested, max });
    }
    Ok(requested)
}

/// Post-debit phase: stage, execute, settle. Always reaches a terminal
/// state and reconciles the ledger.
async fn execute_and_settle(
    store: &dyn LedgerStore,
    executor: &ExecutorClient,
    stager: &dyn BlobStager,
    debit: renderpay_store::DebitOutcome,
    external_id: &str,
    style: Option<String>,
    prompt_ai: bool,
) -> SagaReport {
    let job = debit.job;

    // --- Stage inputs --------------------------------------------------
    let staged = try_join_all(job.inputs.iter().map(|input| async move {
        let signed_url = stager.stage_read_url(&input.path).await?;
        Ok::<_, crate::stager::StageError>(StagedInput {
            kind: input.kind.clone(),
            signed_url,
        })
    }))
    .await;

    let staged = match staged {
        Ok(staged) => staged,
        Err(e) => {
            tracing::warn!(job_id = %job.id, error = %e, "Input staging failed after debit");
            return settle_failure(
                store,
                job,
                STAGING_ERROR_CODE,
                &e.to_string(),
                debit.new_cash_balance_cents,
                debit.new_promo_credits,
            )
            .await;
        }
    };

    // --- Execute (exactly once) ----------------------------------------
    let envelope = JobEnvelope {
        job_id: job.id.to_string(),
        telegram_id: external_id.to_string(),
        model: job.model_id.clone(),
        prompt: job.prompt.clone(),
        params: job.params.clone(),
        inputs: staged,
        style,
        counter: job.unit_count,
        prompt_ai,
    };

    match executor.invoke(&envelope).await {
        Ok(success) => {
            // --- Settle success ----------------------------------------
            match settle_with_retries(|| {
                store.settle_job_succeeded(&job.id, &success.output_url)
            })
            .await
            {
                Ok(settled) => {
                    tracing::info!(
                        job_id = %settled.id,
                        output_url = %success.output_url,
                        "Job succeeded"
                    );
                    SagaReport::Success {
                        job: settled,
                        balance_cents: debit.new_cash_balance_cents,
                        promo_credits: debit.new_promo_credits,
                    }
                }
                Err(e) => {
                    // The render happened but the write did not stick. This
                    // is surfaced distinctly from business failures; no
                    // refund is attempted because the job did not fail.
                    tracing::error!(
                        job_id = %job.id,
                        error = %e,
                        "Settlement write failed after successful execution"
                    );
                    SagaReport::Failure {
                        job,
                        code: SETTLEMENT_ERROR_CODE.to_string(),
                        message: e.to_string(),
                        balance_cents: debit.new_cash_balance_cents,
                        promo_credits: debit.new_promo_credits,
                    }
                }
            }
        }
        Err(e) => {
            tracing::warn!(job_id = %job.id, code = %e.code(), error = %e, "Executor call failed");
            let code = e.code().to_string();
            let message = e.to_string();
            settle_failure(
                store,
                job,
                &code,
                &message,
                debit.new_cash_balance_cents,
                debit.new_promo_credits,
            )
            .await
        }
    }
}

/// Settle a job as failed and refund its charge.
///
/// The refund is best-effort: its failure is logged and the job stays
/// `failed` (operator reconciliation can replay `refund_job`, which is
/// idempotent).
async fn settle_failure(
    store: &dyn LedgerStore,
    job: Job,
    code: &str,
    message: &str,
    debit_balance_cents: i64,
    debit_promo_credits: i64,
) -> SagaReport {
    let detail = format!("{code}: {message}");

    let settled = match settle_with_retries(|| store.settle_job_failed(&job.id, &detail)).await {
        Ok(settled) => settled,
        Err(e) => {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist failure settlement");
            return SagaReport::Failure {
                job,
                code: SETTLEMENT_ERROR_CODE.to_string(),
                message: e.to_string(),
                balance_cents: debit_balance_cents,
                promo_credits: debit_promo_credits,
            };
        }
    };

    let (balance_cents, promo_credits) =
        match settle_with_retries(|| store.refund_job(&settled.id)).await {
            Ok(refund) => (refund.new_cash_balance_cents, refund.new_promo_credits),
            Err(e) => {
                tracing::error!(
                    job_id = %settled.id,
                    error = %e,
                    "Refund failed; job stays failed pending reconciliation"
                );
                (debit_balance_cents, debit_promo_credits)
            }
        };

    SagaReport::Failure {
        job: settled,
        code: code.to_string(),
        message: message.to_string(),
        balance_cents,
        promo_credits,
    }
}

/// Run a settlement-phase store write with bounded retries.
///
/// Only transient storage errors are retried; business errors (e.g. the job
/// is already settled) return immediately.
async fn settle_with_retries<T>(
    op: impl Fn() -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    let mut backoff = Duration::from_millis(SETTLE_INITIAL_BACKOFF_MS);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(LedgerError::Storage(msg)) if attempt < SETTLE_MAX_ATTEMPTS => {
                tracing::warn!(
                    attempt = %attempt,
                    error = %msg,
                    "Settlement write failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
