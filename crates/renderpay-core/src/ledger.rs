//! Ledger entry types for renderpay.
//!
//! All changes to an account's balances create an append-only entry.
//! Entries use ULIDs for time-ordered ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId, JobId};

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Credits deducted for a job.
    Debit,

    /// Credits returned after a failed job. At most one per job.
    Refund,

    /// Credits added to the account (purchase or promo grant).
    Topup,
}

impl EntryType {
    /// Whether this entry type adds credits (positive amount).
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(self, Self::Refund | Self::Topup)
    }

    /// Whether this entry type removes credits (negative amount).
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Debit)
    }

    /// Wire name of this entry type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Refund => "refund",
            Self::Topup => "topup",
        }
    }
}

/// An append-only ledger entry representing one balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The account whose balance was affected.
    pub account_id: AccountId,

    /// The job this entry settles, if any. Topups carry no job.
    pub job_id: Option<JobId>,

    /// Amount in cents. Positive = credit, negative = debit.
    pub amount_cents: i64,

    /// Type of entry.
    pub entry_type: EntryType,

    /// Cash balance after this entry (in cents).
    pub balance_after_cents: i64,

    /// Additional metadata (model id, free units used, reason, ...).
    pub meta: serde_json::Value,

    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a debit entry for a job charge.
    ///
    /// The amount is always stored negative regardless of the sign passed in.
    #[must_use]
    pub fn debit(
        account_id: AccountId,
        job_id: JobId,
        amount_cents: i64,
        balance_after_cents: i64,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            job_id: Some(job_id),
            amount_cents: -amount_cents.abs(),
            entry_type: EntryType::Debit,
            balance_after_cents,
            meta,
            created_at: Utc::now(),
        }
    }

    /// Create a refund entry returning a failed job's charge.
    #[must_use]
    pub fn refund(
        account_id: AccountId,
        job_id: JobId,
        amount_cents: i64,
        balance_after_cents: i64,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            job_id: Some(job_id),
            amount_cents: amount_cents.abs(),
            entry_type: EntryType::Refund,
            balance_after_cents,
            meta,
            created_at: Utc::now(),
        }
    }

    /// Create a topup entry.
    #[must_use]
    pub fn topup(
        account_id: AccountId,
        amount_cents: i64,
        balance_after_cents: i64,
        meta: serde_json::Value,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            account_id,
            job_id: None,
            amount_cents: amount_cents.abs(),
            entry_type: EntryType::Topup,
            balance_after_cents,
            meta,
            created_at: Utc::now(),
        }
    }
}
