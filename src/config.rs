//! Runtime configuration: defaults, optional TOML file, environment overrides.

use crate::domain::loan::LoanApplication;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Longest wait for a row lock before the operation fails as retryable.
    pub lock_timeout_ms: u64,

    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Limits applied to new loan applications.
    pub loan_policy: LoanPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            log_filter: "warn".to_string(),
            loan_policy: LoanPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BankError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Overrides fields from `BANKCORE_LOCK_TIMEOUT_MS` and `BANKCORE_LOG`.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(timeout) = std::env::var("BANKCORE_LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = timeout.parse().map_err(|_| {
                BankError::Config(format!("Invalid BANKCORE_LOCK_TIMEOUT_MS '{}'", timeout))
            })?;
        }
        if let Ok(filter) = std::env::var("BANKCORE_LOG") {
            self.log_filter = filter;
        }
        Ok(self)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Bounds for loan applications. Rates are annual percentages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoanPolicy {
    pub min_principal: Decimal,
    pub min_rate: Decimal,
    pub max_rate: Decimal,
    pub min_term_months: u32,
    pub max_term_months: u32,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            min_principal: dec!(100),
            min_rate: dec!(0.01),
            max_rate: dec!(50),
            min_term_months: 6,
            max_term_months: 120,
        }
    }
}

impl LoanPolicy {
    pub fn validate(&self, application: &LoanApplication) -> Result<()> {
        if application.principal.value() < self.min_principal {
            return Err(BankError::ValidationError(format!(
                "Loan amount must be at least {}",
                self.min_principal
            )));
        }
        if application.annual_rate < self.min_rate || application.annual_rate > self.max_rate {
            return Err(BankError::ValidationError(format!(
                "Interest rate must be between {}% and {}%",
                self.min_rate, self.max_rate
            )));
        }
        if application.term_months < self.min_term_months
            || application.term_months > self.max_term_months
        {
            return Err(BankError::ValidationError(format!(
                "Term must be between {} and {} months",
                self.min_term_months, self.max_term_months
            )));
        }
        Ok(())
    }
}
