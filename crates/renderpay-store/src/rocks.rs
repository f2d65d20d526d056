//! `RocksDB` ledger implementation.
//!
//! Compound operations take a per-account mutex for their full duration (the
//! row-lock of this backend) and commit through a single `WriteBatch`, so a
//! failed insert can never leave a partial balance mutation behind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use renderpay_core::{
    Account, AccountId, Job, JobId, JobStatus, LedgerEntry, LedgerError, Result,
};

use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{DebitOutcome, DebitRequest, LedgerStore, RefundOutcome};

/// RocksDB-backed ledger implementation.
pub struct RocksLedger {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Per-account mutation locks. Entries are created lazily and never
    /// removed; the set of active accounts is small relative to jobs.
    account_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    /// Serializes account creation so the external-id index stays unique.
    create_lock: Mutex<()>,
}

impl RocksLedger {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            account_locks: Mutex::new(HashMap::new()),
            create_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| LedgerError::Serialization(e.to_string()))
    }

    /// Get (or create) the mutation lock for one account.
    fn account_lock(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self
            .account_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(account_id).or_default())
    }

    fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    /// Resolve an external identity to its account record.
    fn resolve_account(&self, external_id: &str) -> Result<Option<Account>> {
        let Some(id_bytes) = self.get_raw(cf::ACCOUNTS_BY_EXTERNAL, &keys::external_key(external_id))?
        else {
            return Ok(None);
        };
        let account_id: AccountId = Self::deserialize(&id_bytes)?;
        self.get_account(&account_id)
    }

    /// Write an account together with a ledger entry and its index row.
    fn stage_account_and_entry(
        &self,
        batch: &mut WriteBatch,
        account: &Account,
        entry: &LedgerEntry,
    ) -> Result<()> {
        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_entries = self.cf(cf::ENTRIES)?;
        let cf_by_account = self.cf(cf::ENTRIES_BY_ACCOUNT)?;

        batch.put_cf(
            &cf_accounts,
            keys::account_key(&account.id),
            Self::serialize(account)?,
        );
        batch.put_cf(
            &cf_entries,
            keys::entry_key(&entry.id),
            Self::serialize(entry)?,
        );
        batch.put_cf(
            &cf_by_account,
            keys::account_entry_key(&account.id, &entry.id),
            [],
        );
        Ok(())
    }

    fn get_entry(&self, entry_id: &renderpay_core::EntryId) -> Result<Option<LedgerEntry>> {
        self.get_raw(cf::ENTRIES, &keys::entry_key(entry_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Settle a job to a terminal status. Shared by both settlement paths.
    fn settle_job(
        &self,
        job_id: &JobId,
        status: JobStatus,
        output_url: Option<&str>,
        error_detail: Option<&str>,
    ) -> Result<Job> {
        let job = self.get_job(job_id)?.ok_or_else(|| LedgerError::JobNotFound {
            job_id: job_id.to_string(),
        })?;

        let lock = self.account_lock(job.account_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-read under the lock; another settlement may have won the race.
        let mut job = self.get_job(job_id)?.ok_or_else(|| LedgerError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        if !job.can_transition_to(status) {
            return Err(LedgerError::JobAlreadySettled {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        job.status = status;
        job.output_url = output_url.map(String::from);
        job.error_detail = error_detail.map(String::from);
        job.finished_at = Some(Utc::now());

        self.put_raw(cf::JOBS, &keys::job_key(job_id), &Self::serialize(&job)?)?;
        Ok(job)
    }
}

impl LedgerStore for RocksLedger {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn create_account(&self, external_id: &str) -> Result<Account> {
        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if self.resolve_account(external_id)?.is_some() {
            return Err(LedgerError::AccountAlreadyExists {
                external_id: external_id.to_string(),
            });
        }

        let account = Account::new(external_id);

        let cf_accounts = self.cf(cf::ACCOUNTS)?;
        let cf_external = self.cf(cf::ACCOUNTS_BY_EXTERNAL)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_accounts,
            keys::account_key(&account.id),
            Self::serialize(&account)?,
        );
        batch.put_cf(
            &cf_external,
            keys::external_key(external_id),
            Self::serialize(&account.id)?,
        );
        self.write_batch(batch)?;

        tracing::info!(account_id = %account.id, external_id = %external_id, "Account created");
        Ok(account)
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        self.get_raw(cf::ACCOUNTS, &keys::account_key(account_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>> {
        self.resolve_account(external_id)
    }

    fn get_or_create_account(&self, external_id: &str) -> Result<Account> {
        if let Some(account) = self.resolve_account(external_id)? {
            return Ok(account);
        }
        match self.create_account(external_id) {
            Ok(account) => Ok(account),
            // Lost the creation race to a concurrent caller.
            Err(LedgerError::AccountAlreadyExists { .. }) => self
                .resolve_account(external_id)?
                .ok_or_else(|| LedgerError::AccountNotFound {
                    external_id: external_id.to_string(),
                }),
            Err(e) => Err(e),
        }
    }

    fn top_up(
        &self,
        external_id: &str,
        cash_cents: i64,
        promo_credits: i64,
        meta: serde_json::Value,
    ) -> Result<Account> {
        let account = self.resolve_account(external_id)?.ok_or_else(|| {
            LedgerError::AccountNotFound {
                external_id: external_id.to_string(),
            }
        })?;

        let lock = self.account_lock(account.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut account = self.get_account(&account.id)?.ok_or_else(|| {
            LedgerError::AccountNotFound {
                external_id: external_id.to_string(),
            }
        })?;

        account.cash_balance_cents += cash_cents.max(0);
        account.promo_credits += promo_credits.max(0);
        account.updated_at = Utc::now();

        let entry = LedgerEntry::topup(
            account.id,
            cash_cents.max(0),
            account.cash_balance_cents,
            meta,
        );

        let mut batch = WriteBatch::default();
        self.stage_account_and_entry(&mut batch, &account, &entry)?;
        self.write_batch(batch)?;

        tracing::info!(
            account_id = %account.id,
            cash_cents = %cash_cents,
            promo_credits = %promo_credits,
            new_balance = %account.cash_balance_cents,
            "Top-up applied"
        );
        Ok(account)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn debit_and_create_job(&self, request: &DebitRequest) -> Result<DebitOutcome> {
        if request.unit_cost_cents == 0 {
            return Err(LedgerError::InvalidCost {
                unit_cost: i64::from(request.unit_cost_cents),
            });
        }
        if request.unit_count == 0 {
            return Err(LedgerError::InvalidCount {
                unit_count: i64::from(request.unit_count),
            });
        }

        let account = self.resolve_account(&request.external_id)?.ok_or_else(|| {
            LedgerError::AccountNotFound {
                external_id: request.external_id.clone(),
            }
        })?;

        let lock = self.account_lock(account.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-read under the lock; a concurrent job may have moved the balance.
        let mut account = self.get_account(&account.id)?.ok_or_else(|| {
            LedgerError::AccountNotFound {
                external_id: request.external_id.clone(),
            }
        })?;

        let unit_cost = i64::from(request.unit_cost_cents);
        let unit_count = i64::from(request.unit_count);
        let free_units = account.promo_credits.clamp(0, unit_count);
        let charge = unit_cost * (unit_count - free_units);

        if !account.can_afford(charge) {
            return Err(LedgerError::InsufficientBalance {
                balance: account.cash_balance_cents,
                required: charge,
            });
        }

        account.cash_balance_cents -= charge;
        account.promo_credits -= free_units;
        account.updated_at = Utc::now();

        let job = Job {
            id: JobId::generate(),
            account_id: account.id,
            model_id: request.model_id.clone(),
            job_type: request.job_type,
            prompt: request.prompt.clone(),
            params: request.params.clone(),
            inputs: request.inputs.clone(),
            status: JobStatus::Processing,
            unit_count: request.unit_count,
            cost_cents: charge,
            promo_credits_consumed: free_units,
            output_url: None,
            error_detail: None,
            created_at: Utc::now(),
            finished_at: None,
        };

        let entry = LedgerEntry::debit(
            account.id,
            job.id,
            charge,
            account.cash_balance_cents,
            serde_json::json!({
                "model": request.model_id,
                "unit_cost_cents": request.unit_cost_cents,
                "unit_count": request.unit_count,
                "free_units_used": free_units,
            }),
        );

        let cf_jobs = self.cf(cf::JOBS)?;
        let cf_jobs_by_account = self.cf(cf::JOBS_BY_ACCOUNT)?;
        let mut batch = WriteBatch::default();
        self.stage_account_and_entry(&mut batch, &account, &entry)?;
        batch.put_cf(&cf_jobs, keys::job_key(&job.id), Self::serialize(&job)?);
        batch.put_cf(
            &cf_jobs_by_account,
            keys::account_job_key(&account.id, &job.id),
            [],
        );
        self.write_batch(batch)?;

        tracing::info!(
            account_id = %account.id,
            job_id = %job.id,
            model = %request.model_id,
            charge_cents = %charge,
            free_units = %free_units,
            new_balance = %account.cash_balance_cents,
            "Debit applied, job created"
        );

        Ok(DebitOutcome {
            job,
            new_cash_balance_cents: account.cash_balance_cents,
            new_promo_credits: account.promo_credits,
            charged_cents: charge,
        })
    }

    fn refund_job(&self, job_id: &JobId) -> Result<RefundOutcome> {
        let job = self.get_job(job_id)?.ok_or_else(|| LedgerError::JobNotFound {
            job_id: job_id.to_string(),
        })?;

        let lock = self.account_lock(job.account_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Re-read job and account under the lock.
        let job = self.get_job(job_id)?.ok_or_else(|| LedgerError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        if job.status != JobStatus::Failed {
            return Err(LedgerError::JobNotFailed {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        let mut account =
            self.get_account(&job.account_id)?
                .ok_or_else(|| LedgerError::AccountNotFound {
                    external_id: job.account_id.to_string(),
                })?;

        // Idempotency: the job id is the refund key.
        if self
            .get_raw(cf::REFUNDS_BY_JOB, &keys::refund_by_job_key(job_id))?
            .is_some()
        {
            tracing::debug!(job_id = %job_id, "Refund already recorded, returning current balances");
            return Ok(RefundOutcome {
                new_cash_balance_cents: account.cash_balance_cents,
                new_promo_credits: account.promo_credits,
                already_refunded: true,
            });
        }

        account.cash_balance_cents += job.cost_cents;
        account.promo_credits += job.promo_credits_consumed;
        account.updated_at = Utc::now();

        let entry = LedgerEntry::refund(
            account.id,
            *job_id,
            job.cost_cents,
            account.cash_balance_cents,
            serde_json::json!({
                "model": job.model_id,
                "promo_credits_returned": job.promo_credits_consumed,
            }),
        );

        let cf_refunds = self.cf(cf::REFUNDS_BY_JOB)?;
        let mut batch = WriteBatch::default();
        self.stage_account_and_entry(&mut batch, &account, &entry)?;
        batch.put_cf(
            &cf_refunds,
            keys::refund_by_job_key(job_id),
            Self::serialize(&entry.id)?,
        );
        self.write_batch(batch)?;

        tracing::info!(
            account_id = %account.id,
            job_id = %job_id,
            refunded_cents = %job.cost_cents,
            promo_returned = %job.promo_credits_consumed,
            new_balance = %account.cash_balance_cents,
            "Refund applied"
        );

        Ok(RefundOutcome {
            new_cash_balance_cents: account.cash_balance_cents,
            new_promo_credits: account.promo_credits,
            already_refunded: false,
        })
    }

    // =========================================================================
    // Job Operations
    // =========================================================================

    fn get_job(&self, job_id: &JobId) -> Result<Option<Job>> {
        self.get_raw(cf::JOBS, &keys::job_key(job_id))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn settle_job_succeeded(&self, job_id: &JobId, output_url: &str) -> Result<Job> {
        self.settle_job(job_id, JobStatus::Succeeded, Some(output_url), None)
    }

    fn settle_job_failed(&self, job_id: &JobId, error_detail: &str) -> Result<Job> {
        self.settle_job(job_id, JobStatus::Failed, None, Some(error_detail))
    }

    fn refund_exists(&self, job_id: &JobId) -> Result<bool> {
        Ok(self
            .get_raw(cf::REFUNDS_BY_JOB, &keys::refund_by_job_key(job_id))?
            .is_some())
    }

    // =========================================================================
    // History
    // =========================================================================

    fn list_entries_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let cf_by_account = self.cf(cf::ENTRIES_BY_ACCOUNT)?;
        let prefix = keys::account_entries_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf_by_account,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // ULID keys are time-ordered; collect then reverse for newest-first.
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| LedgerError::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut entries = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if entries.len() >= limit {
                break;
            }
            let entry_id = keys::extract_entry_id_from_account_key(&key);
            if let Some(entry) = self.get_entry(&entry_id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    fn list_jobs_for_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Job>> {
        let cf_by_account = self.cf(cf::JOBS_BY_ACCOUNT)?;
        let prefix = keys::account_jobs_prefix(account_id);

        let iter = self.db.iterator_cf(
            &cf_by_account,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| LedgerError::Storage(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            all_keys.push(key.to_vec());
        }
        all_keys.reverse();

        let mut jobs = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if jobs.len() >= limit {
                break;
            }
            let job_id = keys::extract_job_id_from_account_key(&key);
            if let Some(job) = self.get_job(&job_id)? {
                jobs.push(job);
            }
        }

        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderpay_core::{EntryType, JobType};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn open_store() -> (RocksLedger, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksLedger::open(dir.path()).unwrap();
        (store, dir)
    }

    fn funded_account(store: &RocksLedger, external_id: &str, cash: i64, promo: i64) {
        store.create_account(external_id).unwrap();
        store
            .top_up(external_id, cash, promo, serde_json::Value::Null)
            .unwrap();
    }

    fn debit_request(external_id: &str, unit_cost: u32, unit_count: u32) -> DebitRequest {
        DebitRequest {
            external_id: external_id.to_string(),
            model_id: "flux-image".into(),
            job_type: JobType::Image,
            prompt: "a fox in the snow".into(),
            params: BTreeMap::new(),
            inputs: Vec::new(),
            unit_cost_cents: unit_cost,
            unit_count,
        }
    }

    #[test]
    fn create_account_and_lookup() {
        let (store, _dir) = open_store();
        let account = store.create_account("tg:1001").unwrap();

        let by_external = store.get_account_by_external_id("tg:1001").unwrap().unwrap();
        assert_eq!(by_external.id, account.id);

        let err = store.create_account("tg:1001").unwrap_err();
        assert!(matches!(err, LedgerError::AccountAlreadyExists { .. }));
    }

    #[test]
    fn get_or_create_is_stable() {
        let (store, _dir) = open_store();
        let first = store.get_or_create_account("tg:7").unwrap();
        let second = store.get_or_create_account("tg:7").unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn top_up_appends_entry() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 1000, 2);

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(account.cash_balance_cents, 1000);
        assert_eq!(account.promo_credits, 2);

        let entries = store.list_entries_for_account(&account.id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::Topup);
        assert_eq!(entries[0].amount_cents, 1000);
    }

    #[test]
    fn debit_charges_cash_and_creates_job() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();

        assert_eq!(outcome.charged_cents, 30);
        assert_eq!(outcome.new_cash_balance_cents, 70);
        assert_eq!(outcome.job.status, JobStatus::Processing);
        assert_eq!(outcome.job.cost_cents, 30);
        assert_eq!(outcome.job.promo_credits_consumed, 0);

        let job = store.get_job(&outcome.job.id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn promo_credits_cover_whole_batch() {
        // cash=100, promo=2, unit_cost=30, unit_count=2 -> charge 0
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 2);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 2))
            .unwrap();

        assert_eq!(outcome.charged_cents, 0);
        assert_eq!(outcome.new_cash_balance_cents, 100);
        assert_eq!(outcome.new_promo_credits, 0);
        assert_eq!(outcome.job.cost_cents, 0);
        assert_eq!(outcome.job.promo_credits_consumed, 2);
    }

    #[test]
    fn promo_credits_cover_part_of_batch() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 1);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 3))
            .unwrap();

        // 3 units, 1 free -> charge 60
        assert_eq!(outcome.charged_cents, 60);
        assert_eq!(outcome.new_cash_balance_cents, 40);
        assert_eq!(outcome.new_promo_credits, 0);
    }

    #[test]
    fn invalid_cost_and_count_leave_no_trace() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 2);
        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();

        let err = store
            .debit_and_create_job(&debit_request("tg:1", 0, 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCost { .. }));

        let err = store
            .debit_and_create_job(&debit_request("tg:1", 30, 0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCount { .. }));

        let after = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(after.cash_balance_cents, 100);
        assert_eq!(after.promo_credits, 2);
        // Only the topup entry exists.
        let entries = store.list_entries_for_account(&account.id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn insufficient_balance_creates_no_job() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 10, 0);
        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();

        let err = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance {
                balance: 10,
                required: 30
            }
        ));

        let after = store.get_account(&account.id).unwrap().unwrap();
        assert_eq!(after.cash_balance_cents, 10);
        let entries = store.list_entries_for_account(&account.id, 10, 0).unwrap();
        assert_eq!(entries.len(), 1); // topup only
    }

    #[test]
    fn unknown_account_rejected() {
        let (store, _dir) = open_store();
        let err = store
            .debit_and_create_job(&debit_request("tg:missing", 30, 1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { .. }));
    }

    #[test]
    fn failed_job_refund_restores_balances() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();
        assert_eq!(outcome.new_cash_balance_cents, 70);

        store
            .settle_job_failed(&outcome.job.id, "executor timeout")
            .unwrap();
        let refund = store.refund_job(&outcome.job.id).unwrap();

        assert!(!refund.already_refunded);
        assert_eq!(refund.new_cash_balance_cents, 100);

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        let entries = store.list_entries_for_account(&account.id, 10, 0).unwrap();
        let refunds: Vec<_> = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Refund)
            .collect();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].amount_cents, 30);
        assert_eq!(refunds[0].job_id, Some(outcome.job.id));
    }

    #[test]
    fn refund_is_idempotent() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 1);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 2))
            .unwrap();
        store.settle_job_failed(&outcome.job.id, "boom").unwrap();

        let first = store.refund_job(&outcome.job.id).unwrap();
        let second = store.refund_job(&outcome.job.id).unwrap();

        assert!(!first.already_refunded);
        assert!(second.already_refunded);
        assert_eq!(
            first.new_cash_balance_cents,
            second.new_cash_balance_cents
        );
        assert_eq!(first.new_promo_credits, second.new_promo_credits);

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(account.cash_balance_cents, 100);
        assert_eq!(account.promo_credits, 1);

        let entries = store.list_entries_for_account(&account.id, 10, 0).unwrap();
        let refund_count = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Refund)
            .count();
        assert_eq!(refund_count, 1);
        assert!(store.refund_exists(&outcome.job.id).unwrap());
    }

    #[test]
    fn refund_of_processing_job_rejected() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();

        let err = store.refund_job(&outcome.job.id).unwrap_err();
        assert!(matches!(err, LedgerError::JobNotFailed { .. }));

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(account.cash_balance_cents, 70); // still debited
    }

    #[test]
    fn refund_of_unknown_job_rejected() {
        let (store, _dir) = open_store();
        let err = store.refund_job(&JobId::generate()).unwrap_err();
        assert!(matches!(err, LedgerError::JobNotFound { .. }));
    }

    #[test]
    fn settlement_is_monotonic() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();

        let settled = store
            .settle_job_succeeded(&outcome.job.id, "https://cdn.example/out.png")
            .unwrap();
        assert_eq!(settled.status, JobStatus::Succeeded);
        assert_eq!(
            settled.output_url.as_deref(),
            Some("https://cdn.example/out.png")
        );
        assert!(settled.finished_at.is_some());

        let err = store
            .settle_job_failed(&outcome.job.id, "too late")
            .unwrap_err();
        assert!(matches!(err, LedgerError::JobAlreadySettled { .. }));
    }

    #[test]
    fn succeeded_job_cannot_be_refunded() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();
        store
            .settle_job_succeeded(&outcome.job.id, "https://cdn.example/out.png")
            .unwrap();

        let err = store.refund_job(&outcome.job.id).unwrap_err();
        assert!(matches!(err, LedgerError::JobNotFailed { .. }));
        assert!(!store.refund_exists(&outcome.job.id).unwrap());
    }

    #[test]
    fn promo_batch_then_paid_job_then_refund() {
        // cash=100, promo=2: a 30x2 job is free; a following 30x1 job
        // charges 30; its failure refund restores cash to 100.
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 2);

        let free = store
            .debit_and_create_job(&debit_request("tg:1", 30, 2))
            .unwrap();
        assert_eq!(free.charged_cents, 0);
        assert_eq!(free.new_cash_balance_cents, 100);
        assert_eq!(free.new_promo_credits, 0);

        let paid = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();
        assert_eq!(paid.charged_cents, 30);
        assert_eq!(paid.new_cash_balance_cents, 70);

        store.settle_job_failed(&paid.job.id, "remote error").unwrap();
        let refund = store.refund_job(&paid.job.id).unwrap();
        assert_eq!(refund.new_cash_balance_cents, 100);
        assert_eq!(refund.new_promo_credits, 0);
    }

    #[test]
    fn list_jobs_returns_newest_first() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);

        let first = store
            .debit_and_create_job(&debit_request("tg:1", 10, 1))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = store
            .debit_and_create_job(&debit_request("tg:1", 10, 1))
            .unwrap();

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        let jobs = store.list_jobs_for_account(&account.id, 10, 0).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.job.id);
        assert_eq!(jobs[1].id, first.job.id);

        let page = store.list_jobs_for_account(&account.id, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, first.job.id);
    }

    #[test]
    fn concurrent_debits_never_go_negative() {
        let (store, _dir) = open_store();
        // Funds for exactly 4 jobs of 25 each.
        funded_account(&store, "tg:1", 100, 0);
        let store = std::sync::Arc::new(store);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store
                    .debit_and_create_job(&debit_request("tg:1", 25, 1))
                    .is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 4);
        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(account.cash_balance_cents, 0);
        assert!(account.cash_balance_cents >= 0);
    }

    #[test]
    fn concurrent_refunds_insert_one_entry() {
        let (store, _dir) = open_store();
        funded_account(&store, "tg:1", 100, 0);
        let outcome = store
            .debit_and_create_job(&debit_request("tg:1", 30, 1))
            .unwrap();
        store.settle_job_failed(&outcome.job.id, "boom").unwrap();

        let store = std::sync::Arc::new(store);
        let job_id = outcome.job.id;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = std::sync::Arc::clone(&store);
            handles.push(std::thread::spawn(move || store.refund_job(&job_id).unwrap()));
        }
        for handle in handles {
            let refund = handle.join().unwrap();
            assert_eq!(refund.new_cash_balance_cents, 100);
        }

        let account = store.get_account_by_external_id("tg:1").unwrap().unwrap();
        assert_eq!(account.cash_balance_cents, 100);
        let entries = store.list_entries_for_account(&account.id, 20, 0).unwrap();
        let refund_count = entries
            .iter()
            .filter(|e| e.entry_type == EntryType::Refund)
            .count();
        assert_eq!(refund_count, 1);
    }
}
