use super::csv::command_reader::{Command, CommandRequest};
use crate::application::Bank;
use crate::error::Result;

/// Runs one batch command against the bank.
pub async fn execute(bank: &Bank, request: CommandRequest) -> Result<()> {
    let CommandRequest { actor, command } = request;
    match command {
        Command::RegisterCustomer { profile, opening } => {
            bank.customers.register(&actor, profile, opening).await?;
        }
        Command::SetKycStatus { customer, status } => {
            bank.customers.set_kyc_status(&actor, customer, status).await?;
        }
        Command::OpenAccount {
            customer,
            account_type,
            initial_deposit,
        } => {
            bank.accounts
                .open_account(&actor, customer, account_type, initial_deposit)
                .await?;
        }
        Command::Deposit {
            account,
            amount,
            description,
        } => {
            bank.transactions
                .deposit(&actor, account, amount, description)
                .await?;
        }
        Command::Withdraw {
            account,
            amount,
            description,
        } => {
            bank.transactions
                .withdraw(&actor, account, amount, description)
                .await?;
        }
        Command::Transfer {
            source,
            target,
            amount,
            description,
        } => {
            bank.transactions
                .transfer(&actor, source, target, amount, description)
                .await?;
        }
        Command::SetAccountStatus { account, status } => {
            bank.accounts.set_status(&actor, account, status).await?;
        }
        Command::ApplyLoan(application) => {
            bank.loans.apply(&actor, application).await?;
        }
        Command::ApproveLoan(loan) => {
            bank.loans.approve(&actor, loan).await?;
        }
        Command::RejectLoan(loan) => {
            bank.loans.reject(&actor, loan).await?;
        }
        Command::RecordEmiPayment(emi) => {
            bank.emi_payments.record_payment(&actor, emi).await?;
        }
        Command::PayEmi {
            emi,
            account,
            amount,
        } => {
            bank.emi_payments
                .pay_from_account(&actor, emi, account, amount)
                .await?;
        }
    }
    Ok(())
}
