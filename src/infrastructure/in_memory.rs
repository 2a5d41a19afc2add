use crate::domain::account::{Account, AccountId, CustomerId};
use crate::domain::customer::Customer;
use crate::domain::emi::{Emi, EmiId};
use crate::domain::loan::{Loan, LoanId};
use crate::domain::ports::{ChangeSet, RecordStore, Sequence};
use crate::domain::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    customers: HashMap<CustomerId, Customer>,
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<AccountId, Vec<Transaction>>,
    loans: HashMap<LoanId, Loan>,
    emis: HashMap<EmiId, Emi>,
}

#[derive(Default)]
struct Sequences {
    customer: AtomicU64,
    account: AtomicU64,
    transaction: AtomicU64,
    loan: AtomicU64,
    emi: AtomicU64,
}

/// A thread-safe in-memory ledger.
///
/// All tables sit behind one `RwLock`, so a change set becomes visible to
/// readers in a single step. Ideal for tests and one-shot batch runs.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let counter = match sequence {
            Sequence::Customer => &self.sequences.customer,
            Sequence::Account => &self.sequences.account,
            Sequence::Transaction => &self.sequences.transaction,
            Sequence::Loan => &self.sequences.loan,
            Sequence::Emi => &self.sequences.emi,
        };
        Ok(counter.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.tables.read().await.customers.get(&id).cloned())
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        Ok(self.tables.read().await.customers.values().cloned().collect())
    }

    async fn account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.tables.read().await.accounts.values().cloned().collect())
    }

    async fn customer_accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    async fn account_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables
            .transactions
            .get(&account_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>> {
        Ok(self.tables.read().await.loans.get(&id).cloned())
    }

    async fn loans(&self) -> Result<Vec<Loan>> {
        Ok(self.tables.read().await.loans.values().cloned().collect())
    }

    async fn emi(&self, id: EmiId) -> Result<Option<Emi>> {
        Ok(self.tables.read().await.emis.get(&id).cloned())
    }

    async fn emis(&self) -> Result<Vec<Emi>> {
        Ok(self.tables.read().await.emis.values().cloned().collect())
    }

    async fn loan_emis(&self, loan_id: LoanId) -> Result<Vec<Emi>> {
        let tables = self.tables.read().await;
        let mut emis: Vec<Emi> = tables
            .emis
            .values()
            .filter(|e| e.loan_id == loan_id)
            .cloned()
            .collect();
        emis.sort_by_key(|e| e.id);
        Ok(emis)
    }

    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.customers.extend(changes.customers);
        tables.accounts.extend(changes.accounts);
        for tx in changes.transactions {
            tables.transactions.entry(tx.account_id).or_default().push(tx);
        }
        tables.loans.extend(changes.loans);
        tables.emis.extend(changes.emis);
        Ok(())
    }
}
