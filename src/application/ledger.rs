//! Ledger store: serialized access to rows for the span of a unit of work.
//!
//! Every money-affecting operation opens a [`UnitOfWork`], locks the rows it
//! touches, validates against the freshly locked state, stages its writes and
//! commits them in one [`RecordStore::apply`] call. Dropping a unit of work
//! without committing discards everything it staged and releases its locks.

use super::locks::{LockKey, LockManager, RowGuard};
use crate::domain::account::{Account, AccountId, AccountType, CustomerId};
use crate::domain::clock::Clock;
use crate::domain::customer::{Customer, CustomerProfile};
use crate::domain::emi::{Emi, EmiId, EmiStatus};
use crate::domain::loan::{Loan, LoanApplication, LoanId};
use crate::domain::money::Money;
use crate::domain::ports::{ChangeSet, RecordStore, RecordStoreBox, Sequence};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{BankError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct Ledger {
    store: RecordStoreBox,
    locks: LockManager,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(store: RecordStoreBox, lock_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks: LockManager::new(lock_timeout),
            clock,
        }
    }

    /// Committed state, without locks. Suitable for queries only.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork {
            ledger: self,
            guards: BTreeMap::new(),
            changes: ChangeSet::default(),
        }
    }

    pub async fn customer(&self, id: CustomerId) -> Result<Customer> {
        self.store
            .customer(id)
            .await?
            .ok_or_else(|| BankError::not_found("Customer", id))
    }

    /// Rows currently held or awaited by some unit of work.
    pub fn locked_rows(&self) -> usize {
        self.locks.tracked_rows()
    }

    pub async fn account(&self, id: AccountId) -> Result<Account> {
        self.store
            .account(id)
            .await?
            .ok_or_else(|| BankError::not_found("Account", id))
    }

    pub async fn loan(&self, id: LoanId) -> Result<Loan> {
        self.store
            .loan(id)
            .await?
            .ok_or_else(|| BankError::not_found("Loan", id))
    }

    pub async fn emi(&self, id: EmiId) -> Result<Emi> {
        self.store
            .emi(id)
            .await?
            .ok_or_else(|| BankError::not_found("EMI", id))
    }
}

/// One atomic, isolated unit of work against the ledger.
pub struct UnitOfWork<'a> {
    ledger: &'a Ledger,
    guards: BTreeMap<LockKey, RowGuard>,
    changes: ChangeSet,
}

impl<'a> UnitOfWork<'a> {
    pub fn now(&self) -> DateTime<Utc> {
        self.ledger.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.ledger.today()
    }

    async fn acquire(&mut self, key: LockKey) -> Result<()> {
        if self.guards.contains_key(&key) {
            return Ok(());
        }
        if let Some(highest) = self.guards.keys().next_back()
            && *highest > key
        {
            return Err(BankError::InvalidOperation(format!(
                "lock on {} requested while holding {}",
                key, highest
            )));
        }
        let guard = self.ledger.locks.acquire(key).await?;
        self.guards.insert(key, guard);
        Ok(())
    }

    fn ensure_held(&self, key: LockKey) -> Result<()> {
        if self.guards.contains_key(&key) {
            Ok(())
        } else {
            Err(BankError::InvalidOperation(format!(
                "{} is not locked by this unit of work",
                key
            )))
        }
    }

    /// Locks the account row and returns its current state.
    pub async fn lock_account(&mut self, id: AccountId) -> Result<Account> {
        self.acquire(LockKey::Account(id)).await?;
        if let Some(account) = self.changes.accounts.get(&id) {
            return Ok(account.clone());
        }
        self.ledger.account(id).await
    }

    /// Locks several accounts in ascending id order, whatever order the caller
    /// lists them in, and returns them in the caller's order.
    pub async fn lock_accounts(&mut self, ids: &[AccountId]) -> Result<Vec<Account>> {
        let mut ordered = ids.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut locked = BTreeMap::new();
        for id in ordered {
            let account = self.lock_account(id).await?;
            locked.insert(id, account);
        }
        Ok(ids.iter().filter_map(|id| locked.get(id).cloned()).collect())
    }

    /// Locks the customer row, which serializes account opening for that
    /// customer. Fails with `NotFound` for unregistered customers.
    pub async fn lock_customer(&mut self, id: CustomerId) -> Result<Customer> {
        self.acquire(LockKey::Customer(id)).await?;
        if let Some(customer) = self.changes.customers.get(&id) {
            return Ok(customer.clone());
        }
        self.ledger.customer(id).await
    }

    /// Registers a customer with KYC pending. The new row is locked by this
    /// unit of work.
    pub async fn insert_customer(&mut self, profile: CustomerProfile) -> Result<Customer> {
        let id = self.ledger.store.next_id(Sequence::Customer).await?;
        self.acquire(LockKey::Customer(id)).await?;
        let customer = Customer::register(id, profile, self.now());
        self.changes.customers.insert(id, customer.clone());
        debug!(customer = id, "customer staged");
        Ok(customer)
    }

    pub fn save_customer(&mut self, customer: Customer) -> Result<()> {
        self.ensure_held(LockKey::Customer(customer.id))?;
        self.changes.customers.insert(customer.id, customer);
        Ok(())
    }

    pub async fn lock_loan(&mut self, id: LoanId) -> Result<Loan> {
        self.acquire(LockKey::Loan(id)).await?;
        if let Some(loan) = self.changes.loans.get(&id) {
            return Ok(loan.clone());
        }
        self.ledger.loan(id).await
    }

    pub async fn lock_emi(&mut self, id: EmiId) -> Result<Emi> {
        self.acquire(LockKey::Emi(id)).await?;
        if let Some(emi) = self.changes.emis.get(&id) {
            return Ok(emi.clone());
        }
        self.ledger.emi(id).await
    }

    /// Reads an installment without locking it.
    pub async fn peek_emi(&self, id: EmiId) -> Result<Emi> {
        if let Some(emi) = self.changes.emis.get(&id) {
            return Ok(emi.clone());
        }
        self.ledger.emi(id).await
    }

    /// The customer's accounts, including ones opened in this unit of work.
    pub async fn customer_accounts(&self, customer_id: CustomerId) -> Result<Vec<Account>> {
        self.ensure_held(LockKey::Customer(customer_id))?;
        let mut accounts: BTreeMap<AccountId, Account> = self
            .ledger
            .store
            .customer_accounts(customer_id)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        for account in self.changes.accounts.values() {
            if account.customer_id == customer_id {
                accounts.insert(account.id, account.clone());
            }
        }
        Ok(accounts.into_values().collect())
    }

    /// Opens a zero-balance account. The new row is locked by this unit of work.
    pub async fn open_account(
        &mut self,
        customer_id: CustomerId,
        account_type: AccountType,
    ) -> Result<Account> {
        self.ensure_held(LockKey::Customer(customer_id))?;
        let id = self.ledger.store.next_id(Sequence::Account).await?;
        self.acquire(LockKey::Account(id)).await?;
        let account = Account::new(id, customer_id, account_type, self.now());
        self.changes.accounts.insert(id, account.clone());
        debug!(account = id, customer = customer_id, %account_type, "account staged");
        Ok(account)
    }

    pub fn save_account(&mut self, account: Account) -> Result<()> {
        self.ensure_held(LockKey::Account(account.id))?;
        self.changes.accounts.insert(account.id, account);
        Ok(())
    }

    /// Appends a log entry for an account this unit of work has locked.
    pub async fn record_transaction(
        &mut self,
        account_id: AccountId,
        kind: TransactionType,
        amount: Money,
        description: String,
    ) -> Result<Transaction> {
        self.ensure_held(LockKey::Account(account_id))?;
        let id = self.ledger.store.next_id(Sequence::Transaction).await?;
        let tx = Transaction {
            id,
            account_id,
            kind,
            amount,
            description,
            created_at: self.now(),
        };
        self.changes.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Creates a Pending loan. The new row is locked by this unit of work.
    pub async fn insert_loan(&mut self, application: &LoanApplication) -> Result<Loan> {
        let id = self.ledger.store.next_id(Sequence::Loan).await?;
        self.acquire(LockKey::Loan(id)).await?;
        let loan = Loan::from_application(id, application, self.now());
        self.changes.loans.insert(id, loan.clone());
        Ok(loan)
    }

    pub fn save_loan(&mut self, loan: Loan) -> Result<()> {
        self.ensure_held(LockKey::Loan(loan.id))?;
        self.changes.loans.insert(loan.id, loan);
        Ok(())
    }

    /// Creates one Pending installment per due date for a locked loan.
    pub async fn schedule_emis(
        &mut self,
        loan_id: LoanId,
        due_dates: &[NaiveDate],
        amount_due: Money,
    ) -> Result<Vec<Emi>> {
        self.ensure_held(LockKey::Loan(loan_id))?;
        let mut schedule = Vec::with_capacity(due_dates.len());
        for due_date in due_dates {
            let id = self.ledger.store.next_id(Sequence::Emi).await?;
            let emi = Emi::scheduled(id, loan_id, *due_date, amount_due);
            self.changes.emis.insert(id, emi.clone());
            schedule.push(emi);
        }
        Ok(schedule)
    }

    pub fn save_emi(&mut self, emi: Emi) -> Result<()> {
        self.ensure_held(LockKey::Emi(emi.id))?;
        self.changes.emis.insert(emi.id, emi);
        Ok(())
    }

    /// Counts unpaid installments of a locked loan, staged writes included.
    pub async fn count_pending_emis(&self, loan_id: LoanId) -> Result<usize> {
        self.ensure_held(LockKey::Loan(loan_id))?;
        let mut emis: BTreeMap<EmiId, Emi> = self
            .ledger
            .store
            .loan_emis(loan_id)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();
        for emi in self.changes.emis.values() {
            if emi.loan_id == loan_id {
                emis.insert(emi.id, emi.clone());
            }
        }
        Ok(emis
            .values()
            .filter(|e| e.status == EmiStatus::Pending)
            .count())
    }

    /// Applies every staged write atomically, then releases the locks.
    pub async fn commit(self) -> Result<()> {
        let UnitOfWork {
            ledger,
            guards,
            changes,
        } = self;
        if !changes.is_empty() {
            ledger.store.apply(changes).await?;
        }
        drop(guards);
        Ok(())
    }
}

#[cfg(test)]
impl Ledger {
    /// Stores a customer row under a chosen id, bypassing registration.
    pub(crate) async fn seed_customer(&self, id: CustomerId) -> Customer {
        let customer = Customer::register(
            id,
            CustomerProfile {
                name: format!("Customer {}", id),
                email: format!("customer{}@example.com", id),
                phone: "555-0100".to_string(),
                address: "1 Bank Street".to_string(),
            },
            self.now(),
        );
        let mut changes = ChangeSet::default();
        changes.customers.insert(id, customer.clone());
        self.store.apply(changes).await.unwrap();
        customer
    }
}
