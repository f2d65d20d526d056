//! Ledger storage layer for renderpay.
//!
//! This crate provides durable account, job, and ledger-entry storage plus
//! the two atomic compound operations the job saga depends on:
//!
//! - [`LedgerStore::debit_and_create_job`] — verify balance, debit cash and
//!   promo credits, and create the job row plus its debit entry in one
//!   all-or-nothing write.
//! - [`LedgerStore::refund_job`] — return a failed job's charge exactly once
//!   (idempotent on the job id).
//!
//! Both operations are serialized per account so balances can never go
//! negative under concurrent jobs; no ordering is imposed across accounts.
//!
//! # Architecture
//!
//! The RocksDB backend uses the following column families:
//!
//! - `accounts`: primary account records, keyed by `account_id`
//! - `accounts_by_external`: external identity index
//! - `jobs`: job records, keyed by `job_id` (ULID)
//! - `entries`: ledger entries, keyed by `entry_id` (ULID)
//! - `entries_by_account`: index for listing an account's history
//! - `jobs_by_account`: index for listing an account's jobs
//! - `refunds_by_job`: refund idempotency index (at most one row per job)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod keys;
pub mod rocks;
pub mod schema;

pub use rocks::RocksLedger;

use std::collections::BTreeMap;

use renderpay_core::catalog::ParamValue;
use renderpay_core::{Account, AccountId, Job, JobId, JobInput, JobType, LedgerEntry, Result};

/// Arguments for the atomic debit-and-create-job operation.
#[derive(Debug, Clone)]
pub struct DebitRequest {
    /// External identity of the paying account.
    pub external_id: String,
    /// Catalog model id.
    pub model_id: String,
    /// Kind of output.
    pub job_type: JobType,
    /// The user's prompt.
    pub prompt: String,
    /// Validated parameters.
    pub params: BTreeMap<String, ParamValue>,
    /// Ordered input declarations.
    pub inputs: Vec<JobInput>,
    /// Cost of one output unit in credits. Must be positive.
    pub unit_cost_cents: u32,
    /// Number of output units. Must be positive.
    pub unit_count: u32,
}

/// Result of a successful debit.
#[derive(Debug, Clone)]
pub struct DebitOutcome {
    /// The created job (status `processing`).
    pub job: Job,
    /// Cash balance after the debit.
    pub new_cash_balance_cents: i64,
    /// Promo credits after the debit.
    pub new_promo_credits: i64,
    /// Amount actually charged, post-promo.
    pub charged_cents: i64,
}

/// Result of a refund call.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    /// Cash balance after (or unchanged, if already refunded).
    pub new_cash_balance_cents: i64,
    /// Promo credits after (or unchanged, if already refunded).
    pub new_promo_credits: i64,
    /// Whether a refund entry already existed and nothing was mutated.
    pub already_refunded: bool,
}

/// The ledger store contract.
///
/// Any backing technology must preserve these semantics verbatim: the two
/// compound operations are all-or-nothing and serialized per account, and
/// refunds are idempotent on the job id.
pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Create an account for an external identity.
    ///
    /// # Errors
    ///
    /// Returns `AccountAlreadyExists` if the identity is already registered.
    fn create_account(&self, external_id: &str) -> Result<Account>;

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get an account by external identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>>;

    /// Get the account for an external identity, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_or_create_account(&self, external_id: &str) -> Result<Account>;

    /// Add cash and/or promo credits to an account, appending a `topup`
    /// ledger entry.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the identity is unknown.
    fn top_up(
        &self,
        external_id: &str,
        cash_cents: i64,
        promo_credits: i64,
        meta: serde_json::Value,
    ) -> Result<Account>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Atomically verify funds, debit the account, and create the job row
    /// (status `processing`) together with its `debit` ledger entry.
    ///
    /// `free_units = min(promo_credits, unit_count)`;
    /// `charge = unit_cost * (unit_count - free_units)`.
    ///
    /// # Errors
    ///
    /// `InvalidCost`, `InvalidCount`, `AccountNotFound`, or
    /// `InsufficientBalance`; in every error case no row is written and no
    /// balance changes.
    fn debit_and_create_job(&self, request: &DebitRequest) -> Result<DebitOutcome>;

    /// Return a failed job's charge and promo credits, appending a `refund`
    /// ledger entry. Idempotent: a second call for the same job returns the
    /// current balances without mutating anything.
    ///
    /// # Errors
    ///
    /// `JobNotFound` if the job does not exist, `JobNotFailed` if its status
    /// is not `failed`.
    fn refund_job(&self, job_id: &JobId) -> Result<RefundOutcome>;

    // =========================================================================
    // Job Operations
    // =========================================================================

    /// Get a job by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_job(&self, job_id: &JobId) -> Result<Option<Job>>;

    /// Settle a job as succeeded, recording its output URL.
    ///
    /// # Errors
    ///
    /// `JobNotFound`, or `JobAlreadySettled` if the job is not `processing`.
    fn settle_job_succeeded(&self, job_id: &JobId, output_url: &str) -> Result<Job>;

    /// Settle a job as failed, recording the failure detail.
    ///
    /// # Errors
    ///
    /// `JobNotFound`, or `JobAlreadySettled` if the job is not `processing`.
    fn settle_job_failed(&self, job_id: &JobId, error_detail: &str) -> Result<Job>;

    /// Whether a refund entry exists for a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn refund_exists(&self, job_id: &JobId) -> Result<bool>;

    // =========================================================================
    // History
    // =========================================================================

    /// List ledger entries for an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    /// List jobs for an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_jobs_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Job>>;
}
