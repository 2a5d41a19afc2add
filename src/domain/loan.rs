use super::account::CustomerId;
use super::money::{Amount, Money};
use crate::error::BankError;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type LoanId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

/// What a loan officer decides about a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanDecision {
    Approve,
    Reject,
}

/// A loan application as submitted by a customer or entered by staff.
#[derive(Debug, Clone, PartialEq)]
pub struct LoanApplication {
    pub customer_id: CustomerId,
    pub principal: Amount,
    /// Annual interest rate in percent, e.g. `9.5` for 9.50%.
    pub annual_rate: Decimal,
    pub term_months: u32,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub customer_id: CustomerId,
    pub principal: Money,
    pub annual_rate: Decimal,
    pub term_months: u32,
    pub status: LoanStatus,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn from_application(id: LoanId, application: &LoanApplication, at: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_id: application.customer_id,
            principal: application.principal.into(),
            annual_rate: application.annual_rate,
            term_months: application.term_months,
            status: LoanStatus::Pending,
            applied_at: at,
            approved_at: None,
        }
    }

    fn invalid_state(&self) -> BankError {
        BankError::InvalidState {
            entity: "Loan",
            id: self.id,
            status: self.status.to_string(),
        }
    }

    pub fn ensure_pending(&self) -> Result<(), BankError> {
        if self.status == LoanStatus::Pending {
            Ok(())
        } else {
            Err(self.invalid_state())
        }
    }

    pub fn approve(&mut self, at: DateTime<Utc>) -> Result<(), BankError> {
        self.ensure_pending()?;
        self.status = LoanStatus::Approved;
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self) -> Result<(), BankError> {
        self.ensure_pending()?;
        self.status = LoanStatus::Rejected;
        Ok(())
    }

    /// Closes an approved loan once its last installment is settled.
    pub fn mark_paid(&mut self) -> Result<(), BankError> {
        if self.status != LoanStatus::Approved {
            return Err(self.invalid_state());
        }
        self.status = LoanStatus::Paid;
        Ok(())
    }

    pub fn monthly_installment(&self) -> Result<Money, BankError> {
        calculate_emi(self.principal, self.annual_rate, self.term_months)
    }
}

/// Computes the equated monthly installment of an amortizing loan.
///
/// `M = P * i * (1 + i)^n / ((1 + i)^n - 1)` with `i` the monthly rate, rounded
/// to 2 decimal places. A zero rate degrades to `P / n`.
pub fn calculate_emi(
    principal: Money,
    annual_rate_percent: Decimal,
    term_months: u32,
) -> Result<Money, BankError> {
    if term_months == 0 {
        return Err(BankError::CalculationError(
            "term must be at least one month".to_string(),
        ));
    }
    let months = Decimal::from(term_months);
    let monthly_rate = annual_rate_percent / Decimal::ONE_HUNDRED / Decimal::from(12);

    if monthly_rate.is_zero() {
        return Ok(Money::new(principal.value() / months));
    }

    let power = (Decimal::ONE + monthly_rate)
        .checked_powu(u64::from(term_months))
        .ok_or_else(|| BankError::CalculationError("compound factor overflowed".to_string()))?;
    let denominator = power - Decimal::ONE;
    if denominator.is_zero() {
        return Err(BankError::CalculationError(
            "Denominator is zero".to_string(),
        ));
    }

    principal
        .value()
        .checked_mul(monthly_rate)
        .and_then(|n| n.checked_mul(power))
        .and_then(|n| n.checked_div(denominator))
        .map(Money::new)
        .ok_or_else(|| BankError::CalculationError("installment overflowed".to_string()))
}

/// Due dates of a schedule approved on `approved_on`: the first day of the
/// following month, then one calendar month apart.
pub fn installment_due_dates(
    approved_on: NaiveDate,
    term_months: u32,
) -> Result<Vec<NaiveDate>, BankError> {
    let out_of_range = || BankError::CalculationError("due date out of range".to_string());
    let first_due = approved_on
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(1)))
        .ok_or_else(out_of_range)?;

    (0..term_months)
        .map(|i| {
            first_due
                .checked_add_months(Months::new(i))
                .ok_or_else(out_of_range)
        })
        .collect()
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoanStatus::Pending => "Pending",
            LoanStatus::Approved => "Approved",
            LoanStatus::Rejected => "Rejected",
            LoanStatus::Paid => "Paid",
        };
        f.write_str(name)
    }
}
