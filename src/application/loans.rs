use super::ledger::{Ledger, UnitOfWork};
use super::transactions::credit_locked;
use crate::config::LoanPolicy;
use crate::domain::access::{Capability, Principal};
use crate::domain::account::{Account, AccountType, CustomerId};
use crate::domain::emi::Emi;
use crate::domain::loan::{
    installment_due_dates, Loan, LoanApplication, LoanDecision, LoanId, LoanStatus,
};
use crate::domain::money::{Amount, Money};
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::Result;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything an approval produced, committed as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanApproval {
    pub loan: Loan,
    pub installment: Money,
    pub schedule: Vec<Emi>,
    pub disbursement_account: Account,
    pub disbursement: Transaction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoanReview {
    Approved(Box<LoanApproval>),
    Rejected(Loan),
}

/// Loan lifecycle: application, approval with schedule and disbursement,
/// rejection.
pub struct LoanEngine {
    ledger: Arc<Ledger>,
    policy: LoanPolicy,
}

impl LoanEngine {
    /// Creates a new `LoanEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The shared ledger that holds loans, installments and the
    ///   disbursement accounts.
    /// * `policy` - Limits every application is validated against.
    pub fn new(ledger: Arc<Ledger>, policy: LoanPolicy) -> Self {
        Self { ledger, policy }
    }

    /// Records a new application in Pending state.
    #[instrument(name = "loans.apply", skip(self), err(level = "warn"))]
    pub async fn apply(&self, actor: &Principal, application: LoanApplication) -> Result<Loan> {
        actor.require_for_customer(
            Capability::ApplyForLoan,
            Capability::ApplyForOwnLoan,
            application.customer_id,
        )?;
        self.policy.validate(&application)?;
        // Customers are never removed, so an unlocked read settles existence.
        self.ledger.customer(application.customer_id).await?;

        let mut uow = self.ledger.begin();
        let loan = uow.insert_loan(&application).await?;
        uow.commit().await?;

        info!(loan = loan.id, customer = loan.customer_id, "loan application submitted");
        Ok(loan)
    }

    #[instrument(name = "loans.review", skip(self), err(level = "warn"))]
    pub async fn review(
        &self,
        actor: &Principal,
        loan_id: LoanId,
        decision: LoanDecision,
    ) -> Result<LoanReview> {
        match decision {
            LoanDecision::Approve => Ok(LoanReview::Approved(Box::new(
                self.approve(actor, loan_id).await?,
            ))),
            LoanDecision::Reject => Ok(LoanReview::Rejected(self.reject(actor, loan_id).await?)),
        }
    }

    /// Approves a pending loan, generates its EMI schedule and disburses the
    /// principal into the customer's current account, all in one unit.
    #[instrument(name = "loans.approve", skip(self), err(level = "warn"))]
    pub async fn approve(&self, actor: &Principal, loan_id: LoanId) -> Result<LoanApproval> {
        actor.require(Capability::ReviewLoans)?;

        let mut uow = self.ledger.begin();
        let mut loan = uow.lock_loan(loan_id).await?;
        let approved_at = uow.now();
        loan.approve(approved_at)?;
        uow.save_loan(loan.clone())?;

        let installment = loan.monthly_installment()?;
        let due_dates = installment_due_dates(approved_at.date_naive(), loan.term_months)?;
        let schedule = uow.schedule_emis(loan.id, &due_dates, installment).await?;

        let account =
            Self::disbursement_account(&mut uow, loan.customer_id, AccountType::Current).await?;
        let principal = Amount::new(loan.principal.value())?;
        let (disbursement_account, disbursement) = credit_locked(
            &mut uow,
            account.id,
            principal,
            TransactionType::LoanDisbursement,
            format!("Loan #{} disbursement.", loan.id),
        )
        .await?;
        uow.commit().await?;

        info!(
            loan = loan.id,
            %installment,
            installments = schedule.len(),
            account = disbursement_account.id,
            "loan approved and disbursed"
        );
        Ok(LoanApproval {
            loan,
            installment,
            schedule,
            disbursement_account,
            disbursement,
        })
    }

    #[instrument(name = "loans.reject", skip(self), err(level = "warn"))]
    pub async fn reject(&self, actor: &Principal, loan_id: LoanId) -> Result<Loan> {
        actor.require(Capability::ReviewLoans)?;

        let mut uow = self.ledger.begin();
        let mut loan = uow.lock_loan(loan_id).await?;
        loan.reject()?;
        uow.save_loan(loan.clone())?;
        uow.commit().await?;

        info!(loan = loan.id, "loan application rejected");
        Ok(loan)
    }

    /// Finds the customer's lowest-numbered active account of `account_type`,
    /// opening one with a zero balance if there is none. Returns it locked.
    /// Fails with `NotFound` if the customer is not registered.
    ///
    /// Calling it again inside the same unit of work returns the same account.
    pub async fn disbursement_account(
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        account_type: AccountType,
    ) -> Result<Account> {
        uow.lock_customer(customer_id).await?;
        let candidates = uow
            .customer_accounts(customer_id)
            .await?
            .into_iter()
            .filter(|a| a.account_type == account_type && a.is_active());
        for candidate in candidates {
            // Status may have changed between the read and the lock.
            let account = uow.lock_account(candidate.id).await?;
            if account.is_active() {
                return Ok(account);
            }
        }
        uow.open_account(customer_id, account_type).await
    }

    /// Loans newest first, optionally narrowed to one status.
    pub async fn loans(&self, actor: &Principal, status: Option<LoanStatus>) -> Result<Vec<Loan>> {
        actor.require(Capability::ReviewLoans)?;
        let mut loans: Vec<Loan> = self
            .ledger
            .store()
            .loans()
            .await?
            .into_iter()
            .filter(|l| status.is_none_or(|s| l.status == s))
            .collect();
        loans.sort_by_key(|l| Reverse((l.applied_at, l.id)));
        Ok(loans)
    }

    /// The loan's installments in due-date order.
    pub async fn schedule(&self, actor: &Principal, loan_id: LoanId) -> Result<Vec<Emi>> {
        let loan = self.ledger.loan(loan_id).await?;
        actor.require_for_customer(
            Capability::ReviewLoans,
            Capability::PayOwnEmi,
            loan.customer_id,
        )?;
        let mut emis = self.ledger.store().loan_emis(loan_id).await?;
        emis.sort_by_key(|e| (e.due_date, e.id));
        Ok(emis)
    }
}
