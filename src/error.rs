use crate::domain::account::AccountId;
use crate::domain::emi::EmiId;
use crate::domain::money::Money;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BankError>;

/// Stable classification of a [`BankError`], independent of its detail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccountInactive,
    InsufficientFunds,
    InvalidOperation,
    InvalidState,
    CalculationError,
    AlreadyPaid,
    AmountMismatch,
    Unauthorized,
    Forbidden,
    Validation,
    LockTimeout,
    Internal,
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("Account #{account} is {status} and cannot be used")]
    AccountInactive { account: AccountId, status: String },
    #[error("Insufficient funds in account #{account}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        balance: Money,
        requested: Money,
    },
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("{entity} #{id} is already {status}")]
    InvalidState {
        entity: &'static str,
        id: u64,
        status: String,
    },
    #[error("EMI calculation failed: {0}")]
    CalculationError(String),
    #[error("EMI #{0} is already marked as paid")]
    AlreadyPaid(EmiId),
    #[error("Payment of {offered} does not cover the amount due of {due}")]
    AmountMismatch { due: Money, offered: Money },
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Timed out waiting for lock on {0}; the operation can be retried")]
    LockTimeout(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl BankError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AccountInactive { .. } => ErrorKind::AccountInactive,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::CalculationError(_) => ErrorKind::CalculationError,
            Self::AlreadyPaid(_) => ErrorKind::AlreadyPaid,
            Self::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::ValidationError(_) | Self::CsvError(_) => ErrorKind::Validation,
            Self::LockTimeout(_) => ErrorKind::LockTimeout,
            Self::Storage(_) | Self::Config(_) | Self::IoError(_) => ErrorKind::Internal,
        }
    }

    /// Lock waits that expire are the only failures a caller may safely retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BankError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("Serialization error: {}", err))
    }
}
