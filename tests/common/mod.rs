#![allow(dead_code)]

use bankcore::application::Bank;
use bankcore::config::Config;
use bankcore::domain::access::Principal;
use bankcore::domain::account::{AccountId, AccountType, CustomerId};
use bankcore::domain::clock::FixedClock;
use bankcore::domain::customer::CustomerProfile;
use bankcore::domain::money::Amount;
use bankcore::infrastructure::in_memory::InMemoryRecordStore;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const HEADER: &str = "op,actor,account,target,customer,loan,emi,amount,rate,term,kind,description,name,email,phone,address";

/// An in-memory bank whose clock starts on 2025-01-15.
pub fn bank() -> (Bank, Arc<FixedClock>) {
    bank_with(Config::default())
}

pub fn bank_with(config: Config) -> (Bank, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
    ));
    let bank = Bank::new(Box::new(InMemoryRecordStore::new()), &config, clock.clone());
    (bank, clock)
}

/// Registers a customer with no accounts and returns their id.
pub async fn customer(bank: &Bank) -> CustomerId {
    let next = bank.customers.customers(&Principal::admin()).await.unwrap().len() + 1;
    bank.customers
        .register(
            &Principal::admin(),
            CustomerProfile {
                name: format!("Customer {}", next),
                email: format!("customer{}@example.com", next),
                phone: "555-0100".to_string(),
                address: "1 Bank Street".to_string(),
            },
            None,
        )
        .await
        .unwrap()
        .customer
        .id
}

pub async fn open_account(
    bank: &Bank,
    customer: CustomerId,
    account_type: AccountType,
    balance: Decimal,
) -> AccountId {
    let deposit = (!balance.is_zero()).then(|| Amount::new(balance).unwrap());
    bank.accounts
        .open_account(&Principal::admin(), customer, account_type, deposit)
        .await
        .unwrap()
        .id
}

/// Writes a command CSV with the standard header followed by `rows`.
pub fn command_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}
