use super::ledger::{Ledger, UnitOfWork};
use super::transactions::credit_locked;
use crate::domain::access::{Capability, Principal};
use crate::domain::account::{Account, AccountId, AccountStatus, AccountType, CustomerId};
use crate::domain::money::Amount;
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, instrument};

/// Account opening, status changes and read-side queries.
pub struct AccountService {
    ledger: Arc<Ledger>,
}

/// Opens an account for a customer this unit of work has locked and credits
/// the opening deposit, if any.
pub(super) async fn open_locked(
    uow: &mut UnitOfWork<'_>,
    customer_id: CustomerId,
    account_type: AccountType,
    initial_deposit: Option<Amount>,
) -> Result<Account> {
    let account = uow.open_account(customer_id, account_type).await?;
    let Some(deposit) = initial_deposit else {
        return Ok(account);
    };
    let (credited, _) = credit_locked(
        uow,
        account.id,
        deposit,
        TransactionType::Deposit,
        "Initial deposit on account opening.".to_string(),
    )
    .await?;
    Ok(credited)
}

impl AccountService {
    /// Creates a new `AccountService` instance.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The ledger every component of the bank shares.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Opens an active account for a registered customer.
    ///
    /// # Arguments
    ///
    /// * `initial_deposit` - Optional opening funds, logged as a deposit so
    ///   that the log alone accounts for every balance.
    #[instrument(name = "accounts.open", skip(self), err(level = "warn"))]
    pub async fn open_account(
        &self,
        actor: &Principal,
        customer_id: CustomerId,
        account_type: AccountType,
        initial_deposit: Option<Amount>,
    ) -> Result<Account> {
        actor.require(Capability::ManageAccounts)?;

        let mut uow = self.ledger.begin();
        uow.lock_customer(customer_id).await?;
        let account = open_locked(&mut uow, customer_id, account_type, initial_deposit).await?;
        uow.commit().await?;

        info!(account = account.id, customer = customer_id, %account_type, "account opened");
        Ok(account)
    }

    pub async fn lookup_account(&self, actor: &Principal, id: AccountId) -> Result<Account> {
        let account = self.ledger.account(id).await?;
        actor.require_for_customer(
            Capability::ManageAccounts,
            Capability::ViewOwnAccounts,
            account.customer_id,
        )?;
        Ok(account)
    }

    /// The account's log, oldest first.
    pub async fn statement(&self, actor: &Principal, id: AccountId) -> Result<Vec<Transaction>> {
        self.lookup_account(actor, id).await?;
        let mut log = self.ledger.store().account_transactions(id).await?;
        log.sort_by_key(|tx| tx.id);
        Ok(log)
    }

    #[instrument(name = "accounts.set_status", skip(self), err(level = "warn"))]
    pub async fn set_status(
        &self,
        actor: &Principal,
        id: AccountId,
        status: AccountStatus,
    ) -> Result<Account> {
        actor.require(Capability::ManageAccounts)?;

        let mut uow = self.ledger.begin();
        let mut account = uow.lock_account(id).await?;
        account.change_status(status)?;
        uow.save_account(account.clone())?;
        uow.commit().await?;

        info!(account = id, %status, "account status changed");
        Ok(account)
    }

    pub async fn customer_accounts(
        &self,
        actor: &Principal,
        customer_id: CustomerId,
    ) -> Result<Vec<Account>> {
        actor.require_for_customer(
            Capability::ManageAccounts,
            Capability::ViewOwnAccounts,
            customer_id,
        )?;
        let mut accounts = self.ledger.store().customer_accounts(customer_id).await?;
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }

    /// Every account, by id.
    pub async fn accounts(&self, actor: &Principal) -> Result<Vec<Account>> {
        actor.require(Capability::ManageAccounts)?;
        let mut accounts = self.ledger.store().accounts().await?;
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }
}
