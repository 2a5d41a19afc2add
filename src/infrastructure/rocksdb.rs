use crate::domain::account::{Account, AccountId, CustomerId};
use crate::domain::customer::Customer;
use crate::domain::emi::{Emi, EmiId};
use crate::domain::loan::{Loan, LoanId};
use crate::domain::ports::{ChangeSet, RecordStore, Sequence};
use crate::domain::transaction::Transaction;
use crate::error::{BankError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Column Family for account rows, keyed by account id.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the transaction log, keyed by account id then transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for loans, keyed by loan id.
pub const CF_LOANS: &str = "loans";
/// Column Family for installments, keyed by EMI id.
pub const CF_EMIS: &str = "emis";
/// Column Family for customer profiles, keyed by customer id.
pub const CF_CUSTOMERS: &str = "customers";

/// Indexed by [`sequence_slot`].
const COLUMN_FAMILIES: [&str; 5] = [CF_ACCOUNTS, CF_TRANSACTIONS, CF_LOANS, CF_EMIS, CF_CUSTOMERS];

/// A persistent ledger backed by RocksDB.
///
/// Rows are stored as JSON, one column family per entity. A change set is
/// written as a single `WriteBatch`, so it lands atomically. Id sequences
/// live in memory and resume from the highest stored id on open.
///
/// `Clone` shares the underlying `Arc<DB>` and sequences.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    sequences: Arc<[AtomicU64; 5]>,
}

fn sequence_slot(sequence: Sequence) -> usize {
    match sequence {
        Sequence::Account => 0,
        Sequence::Transaction => 1,
        Sequence::Loan => 2,
        Sequence::Emi => 3,
        Sequence::Customer => 4,
    }
}

fn transaction_key(account_id: AccountId, tx_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account_id.to_be_bytes());
    key[8..].copy_from_slice(&tx_id.to_be_bytes());
    key
}

/// The trailing big-endian id of a key.
fn trailing_id(key: &[u8]) -> Result<u64> {
    let start = key
        .len()
        .checked_sub(8)
        .ok_or_else(|| BankError::Storage(format!("Malformed key of {} bytes", key.len())))?;
    let mut id = [0u8; 8];
    id.copy_from_slice(&key[start..]);
    Ok(u64::from_be_bytes(id))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating any missing
    /// column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            sequences: Arc::new(Default::default()),
        };
        for (slot, name) in COLUMN_FAMILIES.iter().enumerate() {
            let highest = store.highest_id(name)?;
            store.sequences[slot].store(highest, Ordering::Relaxed);
        }
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BankError::Storage(format!("Column family '{}' not found", name)))
    }

    fn highest_id(&self, name: &str) -> Result<u64> {
        let mut highest = 0;
        for item in self.db.iterator_cf(self.cf(name)?, IteratorMode::Start) {
            let (key, _) = item?;
            highest = highest.max(trailing_id(&key)?);
        }
        Ok(highest)
    }

    fn get<T: DeserializeOwned>(&self, name: &str, id: u64) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(name)?, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(name)?, IteratorMode::Start) {
            let (_, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for RocksDBStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        Ok(self.sequences[sequence_slot(sequence)].fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        self.get(CF_CUSTOMERS, id)
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        self.scan(CF_CUSTOMERS)
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        self.get(CF_ACCOUNTS, id)
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }

    async fn customer_accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let accounts: Vec<Account> = self.scan(CF_ACCOUNTS)?;
        Ok(accounts
            .into_iter()
            .filter(|a| a.customer_id == customer_id)
            .collect())
    }

    async fn account_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let prefix = account_id.to_be_bytes();
        let mode = IteratorMode::From(&prefix, Direction::Forward);

        let mut log = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_TRANSACTIONS)?, mode) {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            log.push(serde_json::from_slice(&value)?);
        }
        Ok(log)
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        self.get(CF_LOANS, id)
    }

    async fn loans(&self) -> Result<Vec<Loan>> {
        self.scan(CF_LOANS)
    }

    async fn emi(&self, id: EmiId) -> Result<Option<Emi>> {
        self.get(CF_EMIS, id)
    }

    async fn emis(&self) -> Result<Vec<Emi>> {
        self.scan(CF_EMIS)
    }

    async fn loan_emis(&self, loan_id: LoanId) -> Result<Vec<Emi>> {
        let emis: Vec<Emi> = self.scan(CF_EMIS)?;
        Ok(emis.into_iter().filter(|e| e.loan_id == loan_id).collect())
    }

    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let mut batch = WriteBatch::default();

        let customers = self.cf(CF_CUSTOMERS)?;
        for (id, customer) in &changes.customers {
            batch.put_cf(customers, id.to_be_bytes(), serde_json::to_vec(customer)?);
        }

        let accounts = self.cf(CF_ACCOUNTS)?;
        for (id, account) in &changes.accounts {
            batch.put_cf(accounts, id.to_be_bytes(), serde_json::to_vec(account)?);
        }
        let transactions = self.cf(CF_TRANSACTIONS)?;
        for tx in &changes.transactions {
            batch.put_cf(
                transactions,
                transaction_key(tx.account_id, tx.id),
                serde_json::to_vec(tx)?,
            );
        }
        let loans = self.cf(CF_LOANS)?;
        for (id, loan) in &changes.loans {
            batch.put_cf(loans, id.to_be_bytes(), serde_json::to_vec(loan)?);
        }
        let emis = self.cf(CF_EMIS)?;
        for (id, emi) in &changes.emis {
            batch.put_cf(emis, id.to_be_bytes(), serde_json::to_vec(emi)?);
        }

        self.db.write(batch)?;
        Ok(())
    }
}
