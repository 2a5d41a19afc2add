//! Capability checks for the authenticated caller.
//!
//! Authentication happens outside the core. Operations receive an already
//! resolved [`Principal`] and check it once, up front, with
//! [`Principal::require`].

use super::account::CustomerId;
use crate::error::BankError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Cashier,
    LoanOfficer,
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Register customers and update their KYC status.
    ManageCustomers,
    /// Open accounts, change their status, look them up.
    ManageAccounts,
    /// Read the caller's own accounts and statements.
    ViewOwnAccounts,
    /// Deposit, withdraw and transfer on any account.
    MoveFunds,
    /// Transfer out of the caller's own accounts.
    TransferOwnFunds,
    /// Enter a loan application for any customer.
    ApplyForLoan,
    /// Submit a loan application for the caller.
    ApplyForOwnLoan,
    /// Approve or reject applications.
    ReviewLoans,
    /// Record an installment as paid without moving funds.
    RecordEmiPayments,
    /// Settle one of the caller's own installments from one of their accounts.
    PayOwnEmi,
}

impl Role {
    pub fn grants(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Admin => matches!(
                capability,
                ManageCustomers
                    | ManageAccounts
                    | MoveFunds
                    | ApplyForLoan
                    | ReviewLoans
                    | RecordEmiPayments
            ),
            Role::Cashier => matches!(
                capability,
                ManageCustomers | ManageAccounts | MoveFunds | ApplyForLoan
            ),
            Role::LoanOfficer => {
                matches!(capability, ApplyForLoan | ReviewLoans | RecordEmiPayments)
            }
            Role::Customer => matches!(
                capability,
                ViewOwnAccounts | TransferOwnFunds | ApplyForOwnLoan | PayOwnEmi
            ),
        }
    }
}

/// The authenticated caller of a core operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    roles: Vec<Role>,
    customer_id: Option<CustomerId>,
}

impl Principal {
    pub fn staff(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            roles: roles.into_iter().filter(|r| *r != Role::Customer).collect(),
            customer_id: None,
        }
    }

    pub fn admin() -> Self {
        Self::staff([Role::Admin])
    }

    pub fn cashier() -> Self {
        Self::staff([Role::Cashier])
    }

    pub fn loan_officer() -> Self {
        Self::staff([Role::LoanOfficer])
    }

    pub fn customer(customer_id: CustomerId) -> Self {
        Self {
            roles: vec![Role::Customer],
            customer_id: Some(customer_id),
        }
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.roles.iter().any(|role| role.grants(capability))
    }

    pub fn require(&self, capability: Capability) -> Result<(), BankError> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(BankError::Forbidden(format!(
                "{} lacks the {:?} capability",
                self, capability
            )))
        }
    }

    /// Passes if the caller holds `staff` or, failing that, `own` for `customer_id`.
    pub fn require_for_customer(
        &self,
        staff: Capability,
        own: Capability,
        customer_id: CustomerId,
    ) -> Result<(), BankError> {
        if self.can(staff) {
            return Ok(());
        }
        self.require(own)?;
        if self.customer_id == Some(customer_id) {
            Ok(())
        } else {
            Err(BankError::Forbidden(format!(
                "{} cannot act on behalf of customer #{}",
                self, customer_id
            )))
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.customer_id {
            Some(id) => write!(f, "customer:{}", id),
            None => {
                let names: Vec<String> = self.roles.iter().map(|r| r.to_string()).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::Cashier => "cashier",
            Role::LoanOfficer => "loan_officer",
            Role::Customer => "customer",
        };
        f.write_str(name)
    }
}

impl FromStr for Principal {
    type Err = BankError;

    /// Parses `admin`, `cashier`, `loan_officer`, `admin|cashier` or `customer:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(id) = s.strip_prefix("customer:") {
            let id = id.trim().parse().map_err(|_| {
                BankError::ValidationError(format!("Invalid customer id in actor '{}'", s))
            })?;
            return Ok(Principal::customer(id));
        }

        let roles = s
            .split('|')
            .map(|name| match name.trim() {
                "admin" => Ok(Role::Admin),
                "cashier" => Ok(Role::Cashier),
                "loan_officer" => Ok(Role::LoanOfficer),
                other => Err(BankError::ValidationError(format!(
                    "Unknown role '{}'",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Principal::staff(roles))
    }
}
