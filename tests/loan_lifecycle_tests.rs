use bankcore::application::loans::LoanReview;
use bankcore::config::{Config, LoanPolicy};
use bankcore::domain::access::Principal;
use bankcore::domain::account::AccountType;
use bankcore::domain::emi::EmiStatus;
use bankcore::domain::loan::{LoanApplication, LoanDecision, LoanStatus, calculate_emi};
use bankcore::domain::money::{Amount, Money};
use bankcore::domain::transaction::TransactionType;
use bankcore::error::ErrorKind;
use chrono::{Datelike, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod common;

fn application(customer_id: u64, principal: Decimal, rate: Decimal, term: u32) -> LoanApplication {
    LoanApplication {
        customer_id,
        principal: Amount::new(principal).unwrap(),
        annual_rate: rate,
        term_months: term,
    }
}

#[tokio::test]
async fn test_approval_creates_current_account_and_schedule() {
    let (bank, _) = common::bank();
    let customer = common::customer(&bank).await;
    // A savings account is not a disbursement target.
    common::open_account(&bank, customer, AccountType::Savings, dec!(10)).await;

    let loan = bank
        .loans
        .apply(&Principal::customer(customer), application(customer, dec!(36000), dec!(6), 36))
        .await
        .unwrap();
    let approval = bank.loans.approve(&Principal::loan_officer(), loan.id).await.unwrap();

    assert_eq!(approval.installment, Money::new(dec!(1095.19)));
    assert_eq!(approval.disbursement_account.account_type, AccountType::Current);
    assert_eq!(approval.disbursement_account.balance, Money::new(dec!(36000)));
    assert_eq!(approval.disbursement.kind, TransactionType::LoanDisbursement);
    assert_eq!(approval.disbursement.amount, Money::new(dec!(36000)));
    assert_eq!(
        approval.disbursement.description,
        format!("Loan #{} disbursement.", loan.id)
    );

    let schedule = bank
        .loans
        .schedule(&Principal::customer(customer), loan.id)
        .await
        .unwrap();
    assert_eq!(schedule.len(), 36);
    // Approved on 2025-01-15: first installment falls due on 2025-02-01.
    assert_eq!(schedule[0].due_date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
    for pair in schedule.windows(2) {
        let (prev, next) = (pair[0].due_date, pair[1].due_date);
        assert_eq!(next.day(), 1);
        assert_eq!((next.year() * 12 + next.month() as i32) - (prev.year() * 12 + prev.month() as i32), 1);
    }
    assert_eq!(schedule[35].due_date, NaiveDate::from_ymd_opt(2028, 1, 1).unwrap());
    assert!(schedule.iter().all(|e| e.amount_due == approval.installment));
}

#[tokio::test]
async fn test_loan_is_paid_only_after_last_installment() {
    let (bank, _) = common::bank();
    let customer_id = common::customer(&bank).await;
    let loan = bank
        .loans
        .apply(&Principal::cashier(), application(customer_id, dec!(6000), dec!(8), 6))
        .await
        .unwrap();
    let approval = bank.loans.approve(&Principal::admin(), loan.id).await.unwrap();
    let account = approval.disbursement_account.id;

    let customer = Principal::customer(customer_id);
    let last = approval.schedule.len() - 1;
    for (i, emi) in approval.schedule.iter().enumerate() {
        let payment = bank
            .emi_payments
            .pay_from_account(&customer, emi.id, account, Amount::new(emi.amount_due.value()).unwrap())
            .await
            .unwrap();
        assert_eq!(payment.emi.status, EmiStatus::Paid);
        let status = bank.ledger().loan(loan.id).await.unwrap().status;
        if i == last {
            assert_eq!(status, LoanStatus::Paid);
        } else {
            assert_eq!(status, LoanStatus::Approved);
        }
    }

    let paid: Money = approval.schedule.iter().map(|e| e.amount_due).sum();
    assert!(paid > Money::new(dec!(6000)));
    assert_eq!(
        bank.ledger().account(account).await.unwrap().balance,
        Money::new(dec!(6000)) - paid
    );
    assert!(
        bank.emi_payments
            .outstanding_emis(&customer, customer_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_review_only_applies_to_pending_loans() {
    let (bank, _) = common::bank();
    let officer = Principal::loan_officer();
    let customer = common::customer(&bank).await;
    let loan = bank
        .loans
        .apply(&officer, application(customer, dec!(1000), dec!(10), 12))
        .await
        .unwrap();

    let review = bank
        .loans
        .review(&officer, loan.id, LoanDecision::Approve)
        .await
        .unwrap();
    assert!(matches!(review, LoanReview::Approved(_)));

    for decision in [LoanDecision::Approve, LoanDecision::Reject] {
        let err = bank.loans.review(&officer, loan.id, decision).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("Approved"));
    }
    // Only one disbursement happened.
    let accounts = bank
        .accounts
        .customer_accounts(&Principal::admin(), customer)
        .await
        .unwrap();
    assert_eq!(accounts[0].balance, Money::new(dec!(1000)));
}

#[tokio::test]
async fn test_zero_rate_loans_under_relaxed_policy() {
    let (bank, _) = common::bank_with(Config {
        loan_policy: LoanPolicy {
            min_rate: Decimal::ZERO,
            ..LoanPolicy::default()
        },
        ..Config::default()
    });
    let customer = common::customer(&bank).await;
    let loan = bank
        .loans
        .apply(&Principal::admin(), application(customer, dec!(12000), dec!(0), 12))
        .await
        .unwrap();
    let approval = bank.loans.approve(&Principal::admin(), loan.id).await.unwrap();
    assert_eq!(approval.installment, Money::new(dec!(1000.00)));
}

#[test]
fn test_emi_formula_reference_values() {
    assert_eq!(
        calculate_emi(Money::new(dec!(10000)), dec!(12), 12).unwrap(),
        Money::new(dec!(888.49))
    );
    assert_eq!(
        calculate_emi(Money::new(dec!(12000)), dec!(0), 12).unwrap(),
        Money::new(dec!(1000.00))
    );
    assert_eq!(
        calculate_emi(Money::new(dec!(12000)), dec!(0), 0).unwrap_err().kind(),
        ErrorKind::CalculationError
    );
}

#[tokio::test]
async fn test_late_installments_after_due_date() {
    let (bank, clock) = common::bank();
    let customer = common::customer(&bank).await;
    let loan = bank
        .loans
        .apply(&Principal::customer(customer), application(customer, dec!(600), dec!(12), 6))
        .await
        .unwrap();
    bank.loans.approve(&Principal::admin(), loan.id).await.unwrap();

    clock.set(Utc.with_ymd_and_hms(2025, 3, 15, 0, 0, 0).unwrap());
    let late = bank
        .emi_payments
        .emis(&Principal::admin(), Some(EmiStatus::Late))
        .await
        .unwrap();
    // 2025-02-01 and 2025-03-01 have passed.
    assert_eq!(late.len(), 2);
    let outstanding = bank
        .emi_payments
        .outstanding_emis(&Principal::customer(customer), customer)
        .await
        .unwrap();
    assert_eq!(outstanding.len(), 6);
}
