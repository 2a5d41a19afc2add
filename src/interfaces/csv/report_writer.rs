use crate::domain::account::Account;
use crate::domain::customer::Customer;
use crate::domain::emi::Emi;
use crate::domain::loan::Loan;
use crate::error::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct CustomerRow<'a> {
    customer: u64,
    name: &'a str,
    email: &'a str,
    kyc_status: String,
}

#[derive(Serialize)]
struct AccountRow {
    account: u64,
    customer: u64,
    #[serde(rename = "type")]
    account_type: String,
    balance: String,
    status: String,
}

#[derive(Serialize)]
struct LoanRow {
    loan: u64,
    customer: u64,
    principal: String,
    rate: String,
    term: u32,
    status: String,
    approved_on: Option<NaiveDate>,
}

#[derive(Serialize)]
struct EmiRow {
    emi: u64,
    loan: u64,
    due_date: NaiveDate,
    amount_due: String,
    status: String,
    payment_date: Option<NaiveDate>,
}

/// Writes ledger reports as CSV. Money is always printed with two decimals.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(sink),
        }
    }

    /// `customer,name,email,kyc_status`
    pub fn write_customers(&mut self, customers: impl IntoIterator<Item = Customer>) -> Result<()> {
        self.writer
            .write_record(["customer", "name", "email", "kyc_status"])?;
        for customer in customers {
            self.writer.serialize(CustomerRow {
                customer: customer.id,
                name: &customer.profile.name,
                email: &customer.profile.email,
                kyc_status: customer.kyc_status.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// `account,customer,type,balance,status`
    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        self.writer
            .write_record(["account", "customer", "type", "balance", "status"])?;
        for account in accounts {
            self.writer.serialize(AccountRow {
                account: account.id,
                customer: account.customer_id,
                account_type: account.account_type.to_string(),
                balance: account.balance.to_string(),
                status: account.status.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// `loan,customer,principal,rate,term,status,approved_on`
    pub fn write_loans(&mut self, loans: impl IntoIterator<Item = Loan>) -> Result<()> {
        self.writer.write_record([
            "loan",
            "customer",
            "principal",
            "rate",
            "term",
            "status",
            "approved_on",
        ])?;
        for loan in loans {
            self.writer.serialize(LoanRow {
                loan: loan.id,
                customer: loan.customer_id,
                principal: loan.principal.to_string(),
                rate: loan.annual_rate.normalize().to_string(),
                term: loan.term_months,
                status: loan.status.to_string(),
                approved_on: loan.approved_at.map(|at| at.date_naive()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// `emi,loan,due_date,amount_due,status,payment_date`, with the status as
    /// seen on `today`.
    pub fn write_emis(&mut self, emis: impl IntoIterator<Item = Emi>, today: NaiveDate) -> Result<()> {
        self.writer.write_record([
            "emi",
            "loan",
            "due_date",
            "amount_due",
            "status",
            "payment_date",
        ])?;
        for emi in emis {
            self.writer.serialize(EmiRow {
                emi: emi.id,
                loan: emi.loan_id,
                due_date: emi.due_date,
                amount_due: emi.amount_due.to_string(),
                status: emi.effective_status(today).to_string(),
                payment_date: emi.payment_date,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
