//! Key encoding utilities for `RocksDB`.

use renderpay_core::{AccountId, EntryId, JobId};

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create an external-identity index key.
#[must_use]
pub fn external_key(external_id: &str) -> Vec<u8> {
    external_id.as_bytes().to_vec()
}

/// Create a job key from a job ID.
#[must_use]
pub fn job_key(job_id: &JobId) -> Vec<u8> {
    job_id.to_bytes().to_vec()
}

/// Create a ledger entry key from an entry ID.
#[must_use]
pub fn entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create an account-entry index key.
///
/// Format: `account_id (16 bytes) || entry_id (16 bytes)`
///
/// Since ULIDs are time-ordered, entries for an account sort by time.
#[must_use]
pub fn account_entry_key(account_id: &AccountId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating all entries for an account.
#[must_use]
pub fn account_entries_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the entry ID from an account-entry index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_entry_id_from_account_key(key: &[u8]) -> EntryId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    EntryId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create an account-job index key.
///
/// Format: `account_id (16 bytes) || job_id (16 bytes)`
#[must_use]
pub fn account_job_key(account_id: &AccountId, job_id: &JobId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&job_id.to_bytes());
    key
}

/// Create a prefix for iterating all jobs for an account.
#[must_use]
pub fn account_jobs_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the job ID from an account-job index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_job_id_from_account_key(key: &[u8]) -> JobId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    JobId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a refund idempotency key from a job ID.
#[must_use]
pub fn refund_by_job_key(job_id: &JobId) -> Vec<u8> {
    job_id.to_bytes().to_vec()
}
