//! Job types for renderpay.
//!
//! A job is created by the ledger's debit step (already `Processing`) and is
//! settled exactly once to `Succeeded` or `Failed`. Its `cost_cents` and
//! `promo_credits_consumed` are fixed at creation and drive the refund if the
//! job fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::ParamValue;
use crate::{AccountId, JobId};

/// Kind of output a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Still image synthesis.
    Image,
    /// Video synthesis.
    Video,
}

/// Lifecycle status of a job.
///
/// Transitions are monotonic and one-directional:
/// `Queued -> Processing -> Succeeded | Failed`. The store rejects any other
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Admitted but not yet debited. Only used transiently.
    Queued,
    /// Debited; the external executor call is pending or in flight.
    Processing,
    /// Executor returned an output; job is terminal.
    Succeeded,
    /// Executor (or staging) failed; job is terminal and refundable.
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// One declared input file for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    /// Input kind (e.g. "image", "audio").
    pub kind: String,
    /// Opaque path in temporary blob storage.
    pub path: String,
}

/// A generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID (ULID for time-ordering).
    pub id: JobId,

    /// Owning account.
    pub account_id: AccountId,

    /// Catalog model that was requested.
    pub model_id: String,

    /// Kind of output.
    pub job_type: JobType,

    /// The user's prompt.
    pub prompt: String,

    /// Validated parameters, canonical form.
    pub params: BTreeMap<String, ParamValue>,

    /// Ordered input declarations.
    pub inputs: Vec<JobInput>,

    /// Current status.
    pub status: JobStatus,

    /// Number of output units requested.
    pub unit_count: u32,

    /// Credits actually charged, post-promo. Fixed at creation.
    pub cost_cents: i64,

    /// Promo credits consumed at debit time. Fixed at creation.
    pub promo_credits_consumed: i64,

    /// Output URL, set on success.
    pub output_url: Option<String>,

    /// Failure detail, set on failure.
    pub error_detail: Option<String>,

    /// When the job was created (debit time).
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Whether the given transition is allowed by the status machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self.status, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Succeeded | JobStatus::Failed)
        )
    }
}
