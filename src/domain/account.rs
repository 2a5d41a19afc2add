use super::money::{Amount, Money};
use crate::error::BankError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type AccountId = u64;
pub type CustomerId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum AccountType {
    Savings,
    Current,
    #[serde(rename = "Fixed Deposit")]
    FixedDeposit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum AccountStatus {
    Active,
    Suspended,
    Closed,
}

/// A customer's account and its current balance.
///
/// The balance is only ever changed through [`Account::credit`] and
/// [`Account::debit`] on a copy obtained from a locked read inside a unit of
/// work, never on a cached read.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    /// Account number.
    pub id: AccountId,
    /// The owning customer.
    pub customer_id: CustomerId,
    pub account_type: AccountType,
    pub balance: Money,
    pub status: AccountStatus,
    pub opened_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: AccountId,
        customer_id: CustomerId,
        account_type: AccountType,
        opened_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            customer_id,
            account_type,
            balance: Money::ZERO,
            status: AccountStatus::Active,
            opened_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    pub fn ensure_active(&self) -> Result<(), BankError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(BankError::AccountInactive {
                account: self.id,
                status: self.status.to_string(),
            })
        }
    }

    pub fn ensure_funds(&self, amount: Money) -> Result<(), BankError> {
        if self.balance >= amount {
            Ok(())
        } else {
            Err(BankError::InsufficientFunds {
                account: self.id,
                balance: self.balance,
                requested: amount,
            })
        }
    }

    /// Adds funds to an active account.
    pub fn credit(&mut self, amount: Amount) -> Result<(), BankError> {
        self.ensure_active()?;
        self.balance += amount.as_money();
        Ok(())
    }

    /// Removes funds from an active account if the balance covers them.
    pub fn debit(&mut self, amount: Amount) -> Result<(), BankError> {
        self.ensure_active()?;
        self.ensure_funds(amount.as_money())?;
        self.balance -= amount.as_money();
        Ok(())
    }

    /// Applies a status change. Closed is terminal and requires an empty balance.
    pub fn change_status(&mut self, status: AccountStatus) -> Result<(), BankError> {
        if self.status == AccountStatus::Closed {
            return Err(BankError::InvalidState {
                entity: "Account",
                id: self.id,
                status: self.status.to_string(),
            });
        }
        if status == AccountStatus::Closed && self.balance != Money::ZERO {
            return Err(BankError::InvalidOperation(format!(
                "Account #{} still holds {} and cannot be closed",
                self.id, self.balance
            )));
        }
        self.status = status;
        Ok(())
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountType::Savings => "Savings",
            AccountType::Current => "Current",
            AccountType::FixedDeposit => "Fixed Deposit",
        };
        f.write_str(name)
    }
}

impl FromStr for AccountType {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "savings" => Ok(AccountType::Savings),
            "current" => Ok(AccountType::Current),
            "fixeddeposit" => Ok(AccountType::FixedDeposit),
            other => Err(BankError::ValidationError(format!(
                "Unknown account type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AccountStatus::Active => "Active",
            AccountStatus::Suspended => "Suspended",
            AccountStatus::Closed => "Closed",
        };
        f.write_str(name)
    }
}

impl FromStr for AccountStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "closed" => Ok(AccountStatus::Closed),
            other => Err(BankError::ValidationError(format!(
                "Unknown account status '{}'",
                other
            ))),
        }
    }
}
