//! Error types for the renderpay ledger.

use crate::ids::IdError;
use crate::job::JobStatus;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
///
/// Business failures (insufficient balance, bad job state) and storage
/// failures share one enum so the store trait has a single error surface;
/// callers match on the business variants and treat the rest as internal.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The unit cost passed to a debit was not positive.
    #[error("invalid unit cost: {unit_cost}")]
    InvalidCost {
        /// The rejected unit cost.
        unit_cost: i64,
    },

    /// The unit count passed to a debit was not positive.
    #[error("invalid unit count: {unit_count}")]
    InvalidCount {
        /// The rejected unit count.
        unit_count: i64,
    },

    /// No account matches the external identity.
    #[error("account not found: {external_id}")]
    AccountNotFound {
        /// The external id that was looked up.
        external_id: String,
    },

    /// An account already exists for the external identity.
    #[error("account already exists: {external_id}")]
    AccountAlreadyExists {
        /// The external id that already exists.
        external_id: String,
    },

    /// The cash balance cannot cover the charge.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Current cash balance in cents.
        balance: i64,
        /// Required charge in cents.
        required: i64,
    },

    /// No job matches the given id.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The job id that was looked up.
        job_id: String,
    },

    /// Refund requested for a job that is not in the `failed` state.
    ///
    /// Refunding a job still in flight would race the executor, so the
    /// ledger only accepts refunds after failure settlement.
    #[error("job {job_id} is not failed (status: {status:?})")]
    JobNotFailed {
        /// The job id.
        job_id: String,
        /// The job's actual status.
        status: JobStatus,
    },

    /// A settlement write targeted a job already in a terminal state.
    #[error("job {job_id} is already settled (status: {status:?})")]
    JobAlreadySettled {
        /// The job id.
        job_id: String,
        /// The job's terminal status.
        status: JobStatus,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
