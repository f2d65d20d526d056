//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Index: external identity to account id, keyed by `external_id`.
    pub const ACCOUNTS_BY_EXTERNAL: &str = "accounts_by_external";

    /// Job records, keyed by `job_id` (ULID).
    pub const JOBS: &str = "jobs";

    /// Ledger entries, keyed by `entry_id` (ULID).
    pub const ENTRIES: &str = "entries";

    /// Index: entries by account, keyed by `account_id || entry_id`.
    /// Value is empty (index only).
    pub const ENTRIES_BY_ACCOUNT: &str = "entries_by_account";

    /// Index: jobs by account, keyed by `account_id || job_id`.
    /// Value is empty (index only).
    pub const JOBS_BY_ACCOUNT: &str = "jobs_by_account";

    /// Refund idempotency index, keyed by `job_id`. Value is the refund
    /// entry id. At most one row per job, ever.
    pub const REFUNDS_BY_JOB: &str = "refunds_by_job";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::ACCOUNTS_BY_EXTERNAL,
        cf::JOBS,
        cf::ENTRIES,
        cf::ENTRIES_BY_ACCOUNT,
        cf::JOBS_BY_ACCOUNT,
        cf::REFUNDS_BY_JOB,
    ]
}
