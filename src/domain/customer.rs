use super::account::CustomerId;
use crate::error::BankError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity verification state of a customer profile.
///
/// The core stores it and lets staff change it; no operation depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KycStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

/// Contact details supplied at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

impl CustomerProfile {
    pub fn validate(&self) -> Result<(), BankError> {
        let fields = [
            ("name", &self.name, 255),
            ("email", &self.email, 255),
            ("phone", &self.phone, 20),
            ("address", &self.address, 500),
        ];
        for (field, value, max) in fields {
            if value.trim().is_empty() {
                return Err(BankError::ValidationError(format!(
                    "Customer {} is required",
                    field
                )));
            }
            if value.chars().count() > max {
                return Err(BankError::ValidationError(format!(
                    "Customer {} exceeds {} characters",
                    field, max
                )));
            }
        }
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(BankError::ValidationError(format!(
                "Invalid email address: {}",
                self.email
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub profile: CustomerProfile,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// A freshly registered customer awaiting KYC review.
    pub fn register(id: CustomerId, profile: CustomerProfile, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            kyc_status: KycStatus::Pending,
            created_at,
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KycStatus::Pending => "Pending",
            KycStatus::Verified => "Verified",
            KycStatus::Rejected => "Rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for KycStatus {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(KycStatus::Pending),
            "verified" => Ok(KycStatus::Verified),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(BankError::ValidationError(format!(
                "Unknown KYC status: {}",
                other
            ))),
        }
    }
}
