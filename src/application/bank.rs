use super::accounts::AccountService;
use super::customers::CustomerService;
use super::emi_payments::EmiPaymentProcessor;
use super::ledger::Ledger;
use super::loans::LoanEngine;
use super::transactions::TransactionEngine;
use crate::config::Config;
use crate::domain::clock::Clock;
use crate::domain::ports::RecordStoreBox;
use std::sync::Arc;

/// The bank core: every component wired over one shared ledger.
///
/// Components share the ledger's lock manager, so operations issued through
/// different components still serialize on the rows they touch.
pub struct Bank {
    pub customers: CustomerService,
    pub accounts: AccountService,
    pub transactions: TransactionEngine,
    pub loans: LoanEngine,
    pub emi_payments: EmiPaymentProcessor,
    ledger: Arc<Ledger>,
}

impl Bank {
    /// Wires every component over a single ledger.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend for all ledger rows.
    /// * `config` - Supplies the lock wait timeout and the loan policy.
    /// * `clock` - Source of timestamps, approval dates and "today" for
    ///   late-installment checks.
    pub fn new(store: RecordStoreBox, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(Ledger::new(store, config.lock_timeout(), clock));
        Self {
            customers: CustomerService::new(ledger.clone()),
            accounts: AccountService::new(ledger.clone()),
            transactions: TransactionEngine::new(ledger.clone()),
            loans: LoanEngine::new(ledger.clone(), config.loan_policy.clone()),
            emi_payments: EmiPaymentProcessor::new(ledger.clone()),
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
