use super::ledger::{Ledger, UnitOfWork};
use super::transactions::debit_locked;
use crate::domain::access::{Capability, Principal};
use crate::domain::account::{AccountId, CustomerId};
use crate::domain::emi::{Emi, EmiId, EmiStatus};
use crate::domain::loan::{Loan, LoanStatus};
use crate::domain::money::Amount;
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{BankError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

/// Outcome of settling one installment.
#[derive(Debug, Clone, PartialEq)]
pub struct EmiPayment {
    pub emi: Emi,
    pub loan: Loan,
    /// The account debit, for funds-backed payments.
    pub debit: Option<Transaction>,
}

impl EmiPayment {
    pub fn loan_closed(&self) -> bool {
        self.loan.status == LoanStatus::Paid
    }
}

/// Settles installments and closes loans once nothing is left to pay.
///
/// Every payment holds the parent loan's lock until commit, so two payments
/// against the same loan never both miss the last-installment transition.
pub struct EmiPaymentProcessor {
    ledger: Arc<Ledger>,
}

impl EmiPaymentProcessor {
    /// Creates a new `EmiPaymentProcessor` instance.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The shared ledger; payments lock the parent loan there
    ///   before touching any installment or account.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Marks an installment paid on staff instruction. No funds move.
    #[instrument(name = "emi.record_payment", skip(self), err(level = "warn"))]
    pub async fn record_payment(&self, actor: &Principal, emi_id: EmiId) -> Result<EmiPayment> {
        actor.require(Capability::RecordEmiPayments)?;

        let mut uow = self.ledger.begin();
        let (loan, mut emi) = Self::lock_installment(&mut uow, emi_id).await?;
        emi.mark_paid(uow.today())?;
        uow.save_emi(emi.clone())?;
        let loan = Self::close_if_settled(&mut uow, loan).await?;
        uow.commit().await?;

        info!(emi = emi.id, loan = loan.id, closed = loan.status == LoanStatus::Paid, "EMI payment recorded");
        Ok(EmiPayment {
            emi,
            loan,
            debit: None,
        })
    }

    /// Pays an installment out of one of the customer's own accounts.
    ///
    /// `amount` must cover the amount due; only the amount due is debited.
    #[instrument(name = "emi.pay_from_account", skip(self), err(level = "warn"))]
    pub async fn pay_from_account(
        &self,
        actor: &Principal,
        emi_id: EmiId,
        source_id: AccountId,
        amount: Amount,
    ) -> Result<EmiPayment> {
        actor.require(Capability::PayOwnEmi)?;
        let Some(customer_id) = actor.customer_id() else {
            return Err(BankError::Unauthorized(format!(
                "{} has no customer profile",
                actor
            )));
        };

        let mut uow = self.ledger.begin();
        let (loan, mut emi) = Self::lock_installment(&mut uow, emi_id).await?;
        let source = uow.lock_account(source_id).await?;

        if source.customer_id != customer_id {
            return Err(BankError::Unauthorized(format!(
                "Account #{} does not belong to customer #{}",
                source.id, customer_id
            )));
        }
        if loan.customer_id != customer_id {
            return Err(BankError::Forbidden(format!(
                "Loan #{} does not belong to customer #{}",
                loan.id, customer_id
            )));
        }
        emi.ensure_unpaid()?;
        source.ensure_active()?;
        source.ensure_funds(amount.as_money())?;
        if amount.as_money() < emi.amount_due {
            return Err(BankError::AmountMismatch {
                due: emi.amount_due,
                offered: amount.as_money(),
            });
        }

        let due = Amount::new(emi.amount_due.value())?;
        let (_, debit) = debit_locked(
            &mut uow,
            source_id,
            due,
            TransactionType::EmiPayment,
            format!("EMI #{} payment for loan #{}.", emi.id, loan.id),
        )
        .await?;
        emi.mark_paid(uow.today())?;
        uow.save_emi(emi.clone())?;
        let loan = Self::close_if_settled(&mut uow, loan).await?;
        uow.commit().await?;

        info!(
            emi = emi.id,
            loan = loan.id,
            account = source_id,
            amount = %emi.amount_due,
            closed = loan.status == LoanStatus::Paid,
            "EMI paid from account"
        );
        Ok(EmiPayment {
            emi,
            loan,
            debit: Some(debit),
        })
    }

    /// Installments across all loans by due date, filtered on the status they
    /// have today.
    pub async fn emis(&self, actor: &Principal, status: Option<EmiStatus>) -> Result<Vec<Emi>> {
        actor.require(Capability::RecordEmiPayments)?;
        let today = self.ledger.today();
        let mut emis: Vec<Emi> = self
            .ledger
            .store()
            .emis()
            .await?
            .into_iter()
            .filter(|e| status.is_none_or(|s| e.effective_status(today) == s))
            .collect();
        emis.sort_by_key(|e| (e.due_date, e.id));
        Ok(emis)
    }

    /// Unpaid installments of the customer's approved loans, by due date.
    pub async fn outstanding_emis(
        &self,
        actor: &Principal,
        customer_id: CustomerId,
    ) -> Result<Vec<Emi>> {
        actor.require_for_customer(
            Capability::RecordEmiPayments,
            Capability::PayOwnEmi,
            customer_id,
        )?;
        let store = self.ledger.store();
        let loans: HashSet<_> = store
            .loans()
            .await?
            .into_iter()
            .filter(|l| l.customer_id == customer_id && l.status == LoanStatus::Approved)
            .map(|l| l.id)
            .collect();

        let mut emis = Vec::new();
        for loan_id in loans {
            emis.extend(store.loan_emis(loan_id).await?.into_iter().filter(|e| !e.is_paid()));
        }
        emis.sort_by_key(|e| (e.due_date, e.id));
        Ok(emis)
    }

    /// Locks the installment's loan, then the installment itself.
    async fn lock_installment(uow: &mut UnitOfWork<'_>, emi_id: EmiId) -> Result<(Loan, Emi)> {
        // The loan id never changes, so an unlocked read is enough to find it.
        let loan_id = uow.peek_emi(emi_id).await?.loan_id;
        let loan = uow.lock_loan(loan_id).await?;
        let emi = uow.lock_emi(emi_id).await?;
        Ok((loan, emi))
    }

    async fn close_if_settled(uow: &mut UnitOfWork<'_>, mut loan: Loan) -> Result<Loan> {
        if uow.count_pending_emis(loan.id).await? == 0 {
            loan.mark_paid()?;
            uow.save_loan(loan.clone())?;
            info!(loan = loan.id, "loan fully repaid");
        }
        Ok(loan)
    }
}
