use bankcore::application::customers::OpeningAccount;
use bankcore::domain::access::Principal;
use bankcore::domain::account::AccountType;
use bankcore::domain::customer::{CustomerProfile, KycStatus};
use bankcore::domain::loan::LoanApplication;
use bankcore::domain::money::{Amount, Money};
use bankcore::error::ErrorKind;
use rust_decimal_macros::dec;

mod common;

fn profile() -> CustomerProfile {
    CustomerProfile {
        name: "Farah Khan".to_string(),
        email: "farah@example.com".to_string(),
        phone: "555-0160".to_string(),
        address: "31 Mill Road".to_string(),
    }
}

#[tokio::test]
async fn test_registration_opens_first_account_atomically() {
    let (bank, _) = common::bank();
    let registration = bank
        .customers
        .register(
            &Principal::cashier(),
            profile(),
            Some(OpeningAccount {
                account_type: AccountType::FixedDeposit,
                initial_deposit: Some(Amount::new(dec!(2500.75)).unwrap()),
            }),
        )
        .await
        .unwrap();
    let customer = registration.customer.id;
    let account = registration.account.unwrap();

    let me = Principal::customer(customer);
    let accounts = bank.accounts.customer_accounts(&me, customer).await.unwrap();
    assert_eq!(accounts, vec![account.clone()]);
    assert_eq!(account.balance, Money::new(dec!(2500.75)));
    let log = bank.accounts.statement(&me, account.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].amount, Money::new(dec!(2500.75)));

    assert_eq!(
        bank.customers.customer(&me, customer).await.unwrap().kyc_status,
        KycStatus::Pending
    );
    assert_eq!(bank.ledger().locked_rows(), 0);
}

#[tokio::test]
async fn test_unregistered_customers_are_rejected_everywhere() {
    let (bank, _) = common::bank();
    let err = bank
        .accounts
        .open_account(&Principal::admin(), 12, AccountType::Savings, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = bank
        .loans
        .apply(
            &Principal::cashier(),
            LoanApplication {
                customer_id: 12,
                principal: Amount::new(dec!(1200)).unwrap(),
                annual_rate: dec!(12),
                term_months: 12,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(bank.accounts.accounts(&Principal::admin()).await.unwrap().is_empty());
    assert!(bank.loans.loans(&Principal::admin(), None).await.unwrap().is_empty());
    assert_eq!(bank.ledger().locked_rows(), 0);
}

#[tokio::test]
async fn test_kyc_status_does_not_gate_operations() {
    let (bank, _) = common::bank();
    let customer = common::customer(&bank).await;
    bank.customers
        .set_kyc_status(&Principal::admin(), customer, KycStatus::Rejected)
        .await
        .unwrap();

    let account = common::open_account(&bank, customer, AccountType::Savings, dec!(40)).await;
    assert_eq!(
        bank.ledger().account(account).await.unwrap().balance,
        Money::new(dec!(40))
    );
}
