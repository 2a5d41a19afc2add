use super::account::{Account, AccountId, CustomerId};
use super::customer::Customer;
use super::emi::{Emi, EmiId};
use super::loan::{Loan, LoanId};
use super::transaction::Transaction;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Identifier sequences handed out by a [`RecordStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Customer,
    Account,
    Transaction,
    Loan,
    Emi,
}

/// Every write staged by one unit of work.
///
/// Rows are keyed by id so that repeated saves of the same row collapse into
/// the last version. Transactions are append-only.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    pub customers: BTreeMap<CustomerId, Customer>,
    pub accounts: BTreeMap<AccountId, Account>,
    pub transactions: Vec<Transaction>,
    pub loans: BTreeMap<LoanId, Loan>,
    pub emis: BTreeMap<EmiId, Emi>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
            && self.accounts.is_empty()
            && self.transactions.is_empty()
            && self.loans.is_empty()
            && self.emis.is_empty()
    }
}

/// Persistence port for the ledger.
///
/// Reads return committed state. [`RecordStore::apply`] must make the whole
/// change set visible at once or not at all; row locking is layered on top
/// by the application's ledger.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn next_id(&self, sequence: Sequence) -> Result<u64>;

    async fn customer(&self, id: CustomerId) -> Result<Option<Customer>>;
    async fn customers(&self) -> Result<Vec<Customer>>;

    async fn account(&self, id: AccountId) -> Result<Option<Account>>;
    async fn accounts(&self) -> Result<Vec<Account>>;
    async fn customer_accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>>;
    async fn account_transactions(&self, account_id: AccountId) -> Result<Vec<Transaction>>;

    async fn loan(&self, id: LoanId) -> Result<Option<Loan>>;
    async fn loans(&self) -> Result<Vec<Loan>>;

    async fn emi(&self, id: EmiId) -> Result<Option<Emi>>;
    async fn emis(&self) -> Result<Vec<Emi>>;
    async fn loan_emis(&self, loan_id: LoanId) -> Result<Vec<Emi>>;

    async fn apply(&self, changes: ChangeSet) -> Result<()>;
}

pub type RecordStoreBox = Box<dyn RecordStore>;
