use super::ledger::{Ledger, UnitOfWork};
use crate::domain::access::{Capability, Principal};
use crate::domain::account::{Account, AccountId};
use crate::domain::money::{Amount, Money};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{BankError, Result};
use std::sync::Arc;
use tracing::{info, instrument};

/// Balances of both sides after a committed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub source_balance: Money,
    pub target_balance: Money,
}

/// Deposits, withdrawals and transfers: each one a locked balance mutation
/// plus its log entries, committed together.
pub struct TransactionEngine {
    ledger: Arc<Ledger>,
}

impl TransactionEngine {
    /// Creates a new `TransactionEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The shared ledger whose row locks serialize balance
    ///   changes across engines.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    #[instrument(name = "ledger.deposit", skip(self), err(level = "warn"))]
    pub async fn deposit(
        &self,
        actor: &Principal,
        account_id: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<Money> {
        actor.require(Capability::MoveFunds)?;

        let mut uow = self.ledger.begin();
        let description = description.unwrap_or_else(|| "Cash deposit by staff.".to_string());
        let (account, _) = credit_locked(
            &mut uow,
            account_id,
            amount,
            TransactionType::Deposit,
            description,
        )
        .await?;
        uow.commit().await?;

        info!(account = account_id, %amount, balance = %account.balance, "deposit committed");
        Ok(account.balance)
    }

    #[instrument(name = "ledger.withdraw", skip(self), err(level = "warn"))]
    pub async fn withdraw(
        &self,
        actor: &Principal,
        account_id: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<Money> {
        actor.require(Capability::MoveFunds)?;

        let mut uow = self.ledger.begin();
        let description = description.unwrap_or_else(|| "Cash withdrawal by staff.".to_string());
        let (account, _) = debit_locked(
            &mut uow,
            account_id,
            amount,
            TransactionType::Withdrawal,
            description,
        )
        .await?;
        uow.commit().await?;

        info!(account = account_id, %amount, balance = %account.balance, "withdrawal committed");
        Ok(account.balance)
    }

    /// Moves funds between two distinct accounts.
    ///
    /// Customers may only move funds out of their own accounts.
    #[instrument(name = "ledger.transfer", skip(self), err(level = "warn"))]
    pub async fn transfer(
        &self,
        actor: &Principal,
        source_id: AccountId,
        target_id: AccountId,
        amount: Amount,
        description: Option<String>,
    ) -> Result<TransferReceipt> {
        if source_id == target_id {
            return Err(BankError::InvalidOperation(
                "Cannot transfer funds to the same account".to_string(),
            ));
        }
        let staff = actor.can(Capability::MoveFunds);
        if !staff {
            actor.require(Capability::TransferOwnFunds)?;
        }

        let mut uow = self.ledger.begin();
        let mut locked = uow.lock_accounts(&[source_id, target_id]).await?.into_iter();
        let (Some(mut source), Some(mut target)) = (locked.next(), locked.next()) else {
            return Err(BankError::InvalidOperation(
                "Transfer accounts could not be locked".to_string(),
            ));
        };

        if !staff && actor.customer_id() != Some(source.customer_id) {
            return Err(BankError::Unauthorized(format!(
                "Account #{} does not belong to {}",
                source.id, actor
            )));
        }
        source.ensure_active()?;
        target.ensure_active()?;
        source.ensure_funds(amount.as_money())?;

        source.debit(amount)?;
        target.credit(amount)?;
        uow.save_account(source.clone())?;
        uow.save_account(target.clone())?;

        let description = description.unwrap_or_else(|| "Funds transfer.".to_string());
        uow.record_transaction(
            source_id,
            TransactionType::TransferOut,
            -amount.as_money(),
            format!("{} [To: #{}]", description, target_id),
        )
        .await?;
        uow.record_transaction(
            target_id,
            TransactionType::TransferIn,
            amount.as_money(),
            format!("{} [From: #{}]", description, source_id),
        )
        .await?;
        uow.commit().await?;

        info!(source = source_id, target = target_id, %amount, "transfer committed");
        Ok(TransferReceipt {
            source_balance: source.balance,
            target_balance: target.balance,
        })
    }
}

/// Locks `account_id`, credits it and logs a positive entry of `kind`.
pub(crate) async fn credit_locked(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    amount: Amount,
    kind: TransactionType,
    description: String,
) -> Result<(Account, Transaction)> {
    let mut account = uow.lock_account(account_id).await?;
    account.credit(amount)?;
    uow.save_account(account.clone())?;
    let tx = uow
        .record_transaction(account_id, kind, amount.as_money(), description)
        .await?;
    Ok((account, tx))
}

/// Locks `account_id`, debits it and logs the outflow.
///
/// Withdrawals are logged with their positive magnitude, every other outflow
/// with a negative amount.
pub(crate) async fn debit_locked(
    uow: &mut UnitOfWork<'_>,
    account_id: AccountId,
    amount: Amount,
    kind: TransactionType,
    description: String,
) -> Result<(Account, Transaction)> {
    let mut account = uow.lock_account(account_id).await?;
    account.debit(amount)?;
    uow.save_account(account.clone())?;
    let logged = match kind {
        TransactionType::Withdrawal => amount.as_money(),
        _ => -amount.as_money(),
    };
    let tx = uow
        .record_transaction(account_id, kind, logged, description)
        .await?;
    Ok((account, tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{AccountStatus, AccountType};
    use crate::domain::clock::SystemClock;
    use crate::infrastructure::in_memory::InMemoryRecordStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn amount(value: Decimal) -> Amount {
        Amount::new(value).unwrap()
    }

    async fn setup(balances: &[Decimal]) -> (TransactionEngine, Arc<Ledger>, Vec<AccountId>) {
        let ledger = Arc::new(Ledger::new(
            Box::new(InMemoryRecordStore::new()),
            Duration::from_millis(200),
            Arc::new(SystemClock),
        ));
        let mut ids = Vec::new();
        for (customer, balance) in balances.iter().enumerate() {
            let customer = customer as u64 + 1;
            ledger.seed_customer(customer).await;
            let mut uow = ledger.begin();
            uow.lock_customer(customer).await.unwrap();
            let mut account = uow.open_account(customer, AccountType::Savings).await.unwrap();
            account.balance = Money::new(*balance);
            uow.save_account(account.clone()).unwrap();
            uow.commit().await.unwrap();
            ids.push(account.id);
        }
        (TransactionEngine::new(ledger.clone()), ledger, ids)
    }

    #[tokio::test]
    async fn test_deposit_logs_inflow() {
        let (engine, ledger, ids) = setup(&[dec!(0)]).await;
        let balance = engine
            .deposit(&Principal::cashier(), ids[0], amount(dec!(25.50)), None)
            .await
            .unwrap();
        assert_eq!(balance, Money::new(dec!(25.50)));

        let log = ledger.store().account_transactions(ids[0]).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].kind, TransactionType::Deposit);
        assert_eq!(log[0].amount, Money::new(dec!(25.50)));
        assert_eq!(log[0].description, "Cash deposit by staff.");
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_leaves_balance() {
        let (engine, ledger, ids) = setup(&[dec!(100.00)]).await;
        let err = engine
            .withdraw(&Principal::cashier(), ids[0], amount(dec!(150.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { .. }));
        assert_eq!(
            ledger.account(ids[0]).await.unwrap().balance,
            Money::new(dec!(100.00))
        );
        assert!(ledger.store().account_transactions(ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_logs_positive_magnitude() {
        let (engine, ledger, ids) = setup(&[dec!(100.00)]).await;
        engine
            .withdraw(&Principal::cashier(), ids[0], amount(dec!(40.00)), None)
            .await
            .unwrap();
        let log = ledger.store().account_transactions(ids[0]).await.unwrap();
        assert_eq!(log[0].kind, TransactionType::Withdrawal);
        assert_eq!(log[0].amount, Money::new(dec!(40.00)));
        assert_eq!(log[0].signed_amount(), Money::new(dec!(-40.00)));
    }

    #[tokio::test]
    async fn test_deposit_into_suspended_account() {
        let (engine, ledger, ids) = setup(&[dec!(10.00)]).await;
        {
            let mut uow = ledger.begin();
            let mut account = uow.lock_account(ids[0]).await.unwrap();
            account.status = AccountStatus::Suspended;
            uow.save_account(account).unwrap();
            uow.commit().await.unwrap();
        }
        let err = engine
            .deposit(&Principal::cashier(), ids[0], amount(dec!(1.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::AccountInactive { .. }));
    }

    #[tokio::test]
    async fn test_transfer_writes_both_legs() {
        let (engine, ledger, ids) = setup(&[dec!(500.00), dec!(20.00)]).await;
        let receipt = engine
            .transfer(
                &Principal::cashier(),
                ids[0],
                ids[1],
                amount(dec!(120.00)),
                Some("Rent".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(receipt.source_balance, Money::new(dec!(380.00)));
        assert_eq!(receipt.target_balance, Money::new(dec!(140.00)));

        let out = ledger.store().account_transactions(ids[0]).await.unwrap();
        assert_eq!(out[0].kind, TransactionType::TransferOut);
        assert_eq!(out[0].amount, Money::new(dec!(-120.00)));
        assert_eq!(out[0].description, format!("Rent [To: #{}]", ids[1]));

        let inflow = ledger.store().account_transactions(ids[1]).await.unwrap();
        assert_eq!(inflow[0].kind, TransactionType::TransferIn);
        assert_eq!(inflow[0].amount, Money::new(dec!(120.00)));
        assert_eq!(inflow[0].description, format!("Rent [From: #{}]", ids[0]));
    }

    #[tokio::test]
    async fn test_transfer_to_same_account_is_rejected() {
        let (engine, _, ids) = setup(&[dec!(50.00)]).await;
        let err = engine
            .transfer(&Principal::cashier(), ids[0], ids[0], amount(dec!(1.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn test_transfer_to_missing_account_keeps_source() {
        let (engine, ledger, ids) = setup(&[dec!(50.00)]).await;
        let err = engine
            .transfer(&Principal::cashier(), ids[0], 999, amount(dec!(10.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::NotFound { id: 999, .. }));
        assert_eq!(
            ledger.account(ids[0]).await.unwrap().balance,
            Money::new(dec!(50.00))
        );
    }

    #[tokio::test]
    async fn test_customer_transfer_requires_ownership() {
        let (engine, ledger, ids) = setup(&[dec!(50.00), dec!(50.00)]).await;
        let owner = ledger.account(ids[0]).await.unwrap().customer_id;

        let err = engine
            .transfer(&Principal::customer(owner), ids[1], ids[0], amount(dec!(5.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::Unauthorized(_)));

        engine
            .transfer(&Principal::customer(owner), ids[0], ids[1], amount(dec!(5.00)), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_loan_officer_cannot_move_funds() {
        let (engine, _, ids) = setup(&[dec!(50.00)]).await;
        let err = engine
            .deposit(&Principal::loan_officer(), ids[0], amount(dec!(5.00)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, BankError::Forbidden(_)));
    }
}
