use super::accounts::open_locked;
use super::ledger::Ledger;
use crate::domain::access::{Capability, Principal};
use crate::domain::account::{Account, AccountType, CustomerId};
use crate::domain::customer::{Customer, CustomerProfile, KycStatus};
use crate::domain::money::Amount;
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, instrument};

/// The first account opened together with a new customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpeningAccount {
    pub account_type: AccountType,
    pub initial_deposit: Option<Amount>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub customer: Customer,
    pub account: Option<Account>,
}

/// Customer registration and KYC bookkeeping.
pub struct CustomerService {
    ledger: Arc<Ledger>,
}

impl CustomerService {
    /// Creates a new `CustomerService` instance.
    ///
    /// # Arguments
    ///
    /// * `ledger` - The shared ledger that stores customer rows next to their
    ///   accounts.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Registers a customer with KYC pending and, optionally, opens their
    /// first account. Both land in one commit or neither does.
    ///
    /// # Arguments
    ///
    /// * `profile` - Contact details; every field is required.
    /// * `opening` - The first account to open under the new customer, if any.
    #[instrument(name = "customers.register", skip(self), err(level = "warn"))]
    pub async fn register(
        &self,
        actor: &Principal,
        profile: CustomerProfile,
        opening: Option<OpeningAccount>,
    ) -> Result<Registration> {
        actor.require(Capability::ManageCustomers)?;
        profile.validate()?;

        let mut uow = self.ledger.begin();
        let customer = uow.insert_customer(profile).await?;
        let account = match opening {
            Some(opening) => Some(
                open_locked(
                    &mut uow,
                    customer.id,
                    opening.account_type,
                    opening.initial_deposit,
                )
                .await?,
            ),
            None => None,
        };
        uow.commit().await?;

        info!(
            customer = customer.id,
            account = account.as_ref().map(|a| a.id),
            "customer registered"
        );
        Ok(Registration { customer, account })
    }

    pub async fn customer(&self, actor: &Principal, id: CustomerId) -> Result<Customer> {
        actor.require_for_customer(
            Capability::ManageCustomers,
            Capability::ViewOwnAccounts,
            id,
        )?;
        self.ledger.customer(id).await
    }

    /// Every customer, by id.
    pub async fn customers(&self, actor: &Principal) -> Result<Vec<Customer>> {
        actor.require(Capability::ManageCustomers)?;
        let mut customers = self.ledger.store().customers().await?;
        customers.sort_by_key(|c| c.id);
        Ok(customers)
    }

    #[instrument(name = "customers.set_kyc_status", skip(self), err(level = "warn"))]
    pub async fn set_kyc_status(
        &self,
        actor: &Principal,
        id: CustomerId,
        status: KycStatus,
    ) -> Result<Customer> {
        actor.require(Capability::ManageCustomers)?;

        let mut uow = self.ledger.begin();
        let mut customer = uow.lock_customer(id).await?;
        customer.kyc_status = status;
        uow.save_customer(customer.clone())?;
        uow.commit().await?;

        info!(customer = id, %status, "KYC status changed");
        Ok(customer)
    }
}
