use super::account::AccountId;
use super::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TransactionId = u64;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    #[serde(rename = "Transfer (In)")]
    TransferIn,
    #[serde(rename = "Transfer (Out)")]
    TransferOut,
    #[serde(rename = "Loan Disbursement")]
    LoanDisbursement,
    #[serde(rename = "EMI Payment")]
    EmiPayment,
}

/// An immutable entry of the transaction log.
///
/// Transfers out and EMI payments carry a negative amount. Withdrawals keep the
/// positive magnitude they were requested with; use
/// [`Transaction::signed_amount`] for the effect on the balance.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionType,
    pub amount: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionType::Withdrawal => -self.amount.abs(),
            _ => self.amount,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::TransferIn => "Transfer (In)",
            TransactionType::TransferOut => "Transfer (Out)",
            TransactionType::LoanDisbursement => "Loan Disbursement",
            TransactionType::EmiPayment => "EMI Payment",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(kind: TransactionType, amount: Money) -> Transaction {
        Transaction {
            id: 1,
            account_id: 1,
            kind,
            amount,
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_amount_follows_balance_effect() {
        let ten = Money::new(dec!(10.00));
        assert_eq!(entry(TransactionType::Deposit, ten).signed_amount(), ten);
        assert_eq!(entry(TransactionType::Withdrawal, ten).signed_amount(), -ten);
        assert_eq!(entry(TransactionType::TransferOut, -ten).signed_amount(), -ten);
        assert_eq!(entry(TransactionType::EmiPayment, -ten).signed_amount(), -ten);
        assert_eq!(entry(TransactionType::LoanDisbursement, ten).signed_amount(), ten);
    }

    #[test]
    fn test_transaction_type_labels() {
        let json = serde_json::to_string(&TransactionType::TransferOut).unwrap();
        assert_eq!(json, "\"Transfer (Out)\"");
        assert_eq!(TransactionType::EmiPayment.to_string(), "EMI Payment");
    }
}
