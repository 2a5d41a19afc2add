use super::loan::LoanId;
use super::money::Money;
use crate::error::BankError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type EmiId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum EmiStatus {
    Pending,
    Paid,
    Late,
}

/// One scheduled installment of an approved loan.
///
/// The stored status only moves from Pending to Paid. Lateness is derived on
/// read by [`Emi::effective_status`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Emi {
    pub id: EmiId,
    pub loan_id: LoanId,
    pub due_date: NaiveDate,
    pub amount_due: Money,
    pub payment_date: Option<NaiveDate>,
    pub status: EmiStatus,
}

impl Emi {
    pub fn scheduled(id: EmiId, loan_id: LoanId, due_date: NaiveDate, amount_due: Money) -> Self {
        Self {
            id,
            loan_id,
            due_date,
            amount_due,
            payment_date: None,
            status: EmiStatus::Pending,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == EmiStatus::Paid
    }

    pub fn ensure_unpaid(&self) -> Result<(), BankError> {
        if self.is_paid() {
            Err(BankError::AlreadyPaid(self.id))
        } else {
            Ok(())
        }
    }

    pub fn mark_paid(&mut self, on: NaiveDate) -> Result<(), BankError> {
        self.ensure_unpaid()?;
        self.status = EmiStatus::Paid;
        self.payment_date = Some(on);
        Ok(())
    }

    /// Status as seen on `today`: an unpaid installment past its due date is Late.
    pub fn effective_status(&self, today: NaiveDate) -> EmiStatus {
        match self.status {
            EmiStatus::Pending if self.due_date < today => EmiStatus::Late,
            status => status,
        }
    }
}

impl fmt::Display for EmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EmiStatus::Pending => "Pending",
            EmiStatus::Paid => "Paid",
            EmiStatus::Late => "Late",
        };
        f.write_str(name)
    }
}

impl FromStr for EmiStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(EmiStatus::Pending),
            "paid" => Ok(EmiStatus::Paid),
            "late" => Ok(EmiStatus::Late),
            other => Err(BankError::ValidationError(format!(
                "Unknown EMI status '{}'",
                other
            ))),
        }
    }
}
