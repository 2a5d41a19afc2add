use crate::domain::access::Principal;
use crate::application::customers::OpeningAccount;
use crate::domain::account::{AccountId, AccountStatus, AccountType, CustomerId};
use crate::domain::customer::{CustomerProfile, KycStatus};
use crate::domain::emi::EmiId;
use crate::domain::loan::{LoanApplication, LoanId};
use crate::domain::money::Amount;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    OpenCustomer,
    SetKycStatus,
    OpenAccount,
    Deposit,
    Withdraw,
    Transfer,
    SetAccountStatus,
    ApplyLoan,
    ApproveLoan,
    RejectLoan,
    RecordEmiPayment,
    PayEmi,
}

/// One raw CSV row. Columns an operation does not use are left empty.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    pub op: Operation,
    pub actor: String,
    pub account: Option<AccountId>,
    pub target: Option<AccountId>,
    pub customer: Option<CustomerId>,
    pub loan: Option<LoanId>,
    pub emi: Option<EmiId>,
    pub amount: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub term: Option<u32>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// A fully typed core operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RegisterCustomer {
        profile: CustomerProfile,
        opening: Option<OpeningAccount>,
    },
    SetKycStatus {
        customer: CustomerId,
        status: KycStatus,
    },
    OpenAccount {
        customer: CustomerId,
        account_type: AccountType,
        initial_deposit: Option<Amount>,
    },
    Deposit {
        account: AccountId,
        amount: Amount,
        description: Option<String>,
    },
    Withdraw {
        account: AccountId,
        amount: Amount,
        description: Option<String>,
    },
    Transfer {
        source: AccountId,
        target: AccountId,
        amount: Amount,
        description: Option<String>,
    },
    SetAccountStatus {
        account: AccountId,
        status: AccountStatus,
    },
    ApplyLoan(LoanApplication),
    ApproveLoan(LoanId),
    RejectLoan(LoanId),
    RecordEmiPayment(EmiId),
    PayEmi {
        emi: EmiId,
        account: AccountId,
        amount: Amount,
    },
}

/// A command together with the principal issuing it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub actor: Principal,
    pub command: Command,
}

fn required<T>(value: Option<T>, field: &str, op: Operation) -> Result<T> {
    value.ok_or_else(|| BankError::ValidationError(format!("{:?} requires '{}'", op, field)))
}

/// An empty or zero opening balance opens an unfunded account. Anything else
/// must be a valid [`Amount`].
fn opening_deposit(value: Option<Decimal>) -> Result<Option<Amount>> {
    match value {
        Some(value) if !value.is_zero() => Amount::new(value).map(Some),
        _ => Ok(None),
    }
}

impl TryFrom<CommandRecord> for CommandRequest {
    type Error = BankError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let op = record.op;
        let actor: Principal = record.actor.parse()?;
        let amount = || -> Result<Amount> { Amount::new(required(record.amount, "amount", op)?) };

        let command = match op {
            Operation::OpenCustomer => {
                let initial_deposit = opening_deposit(record.amount)?;
                let opening = match record.kind.as_deref() {
                    Some(kind) => Some(OpeningAccount {
                        account_type: kind.parse()?,
                        initial_deposit,
                    }),
                    None if initial_deposit.is_some() => {
                        return Err(BankError::ValidationError(
                            "An opening balance needs an account 'kind'".to_string(),
                        ));
                    }
                    None => None,
                };
                Command::RegisterCustomer {
                    profile: CustomerProfile {
                        name: required(record.name, "name", op)?,
                        email: required(record.email, "email", op)?,
                        phone: required(record.phone, "phone", op)?,
                        address: required(record.address, "address", op)?,
                    },
                    opening,
                }
            }
            Operation::SetKycStatus => Command::SetKycStatus {
                customer: required(record.customer, "customer", op)?,
                status: required(record.kind.as_deref(), "kind", op)?.parse()?,
            },
            Operation::OpenAccount => Command::OpenAccount {
                customer: required(record.customer, "customer", op)?,
                account_type: required(record.kind.as_deref(), "kind", op)?.parse()?,
                initial_deposit: opening_deposit(record.amount)?,
            },
            Operation::Deposit => Command::Deposit {
                account: required(record.account, "account", op)?,
                amount: amount()?,
                description: record.description,
            },
            Operation::Withdraw => Command::Withdraw {
                account: required(record.account, "account", op)?,
                amount: amount()?,
                description: record.description,
            },
            Operation::Transfer => Command::Transfer {
                source: required(record.account, "account", op)?,
                target: required(record.target, "target", op)?,
                amount: amount()?,
                description: record.description,
            },
            Operation::SetAccountStatus => Command::SetAccountStatus {
                account: required(record.account, "account", op)?,
                status: required(record.kind.as_deref(), "kind", op)?.parse()?,
            },
            Operation::ApplyLoan => Command::ApplyLoan(LoanApplication {
                customer_id: required(record.customer, "customer", op)?,
                principal: amount()?,
                annual_rate: required(record.rate, "rate", op)?,
                term_months: required(record.term, "term", op)?,
            }),
            Operation::ApproveLoan => Command::ApproveLoan(required(record.loan, "loan", op)?),
            Operation::RejectLoan => Command::RejectLoan(required(record.loan, "loan", op)?),
            Operation::RecordEmiPayment => {
                Command::RecordEmiPayment(required(record.emi, "emi", op)?)
            }
            Operation::PayEmi => Command::PayEmi {
                emi: required(record.emi, "emi", op)?,
                account: required(record.account, "account", op)?,
                amount: amount()?,
            },
        };
        Ok(Self { actor, command })
    }
}

/// Reads batch commands from a CSV source.
///
/// Rows are trimmed and may omit trailing columns. Each row is parsed and
/// typed on its own, so one bad row never stops the stream.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one typed request per row.
    pub fn commands(self) -> impl Iterator<Item = Result<CommandRequest>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result?;
            CommandRequest::try_from(record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str =
        "op,actor,account,target,customer,loan,emi,amount,rate,term,kind,description,name,email,phone,address";

    fn parse(rows: &str) -> Vec<Result<CommandRequest>> {
        let data = format!("{}\n{}", HEADER, rows);
        CommandReader::new(data.as_bytes()).commands().collect()
    }

    #[test]
    fn test_reader_valid_stream() {
        let results = parse(
            "open_account, admin, , , 1, , , 100.00, , , savings, \n\
             transfer, customer:1, 1, 2, , , , 25.5, , , , Rent\n\
             apply_loan, customer:1, , , 1, , , 36000, 6, 36, , ",
        );
        assert_eq!(results.len(), 3);

        let open = results[0].as_ref().unwrap();
        assert_eq!(open.actor, Principal::admin());
        assert_eq!(
            open.command,
            Command::OpenAccount {
                customer: 1,
                account_type: AccountType::Savings,
                initial_deposit: Some(Amount::new(dec!(100.00)).unwrap()),
            }
        );

        let transfer = results[1].as_ref().unwrap();
        assert_eq!(transfer.actor, Principal::customer(1));
        assert!(matches!(
            &transfer.command,
            Command::Transfer { source: 1, target: 2, description: Some(d), .. } if d == "Rent"
        ));

        let apply = results[2].as_ref().unwrap();
        assert!(matches!(
            &apply.command,
            Command::ApplyLoan(app) if app.term_months == 36 && app.annual_rate == dec!(6)
        ));
    }

    #[test]
    fn test_reader_customer_rows() {
        let results = parse(
            "open_customer, cashier, , , , , , 1000.00, , , savings, , Lata Shah, lata@example.com, 555-0142, 3 Park Street\n\
             open_customer, admin, , , , , , , , , , , Omar Ali, omar@example.com, 555-0143, 8 River Road\n\
             open_customer, admin, , , , , , 10, , , , , Omar Ali, omar@example.com, 555-0143, 8 River Road\n\
             open_customer, admin, , , , , , , , , current, , Omar Ali\n\
             set_kyc_status, admin, , , 2, , , , , , verified",
        );
        assert_eq!(results.len(), 5);

        let Command::RegisterCustomer { profile, opening } = &results[0].as_ref().unwrap().command
        else {
            panic!("expected a registration");
        };
        assert_eq!(profile.name, "Lata Shah");
        assert_eq!(profile.address, "3 Park Street");
        assert_eq!(
            *opening,
            Some(OpeningAccount {
                account_type: AccountType::Savings,
                initial_deposit: Some(Amount::new(dec!(1000)).unwrap()),
            })
        );

        assert!(matches!(
            &results[1].as_ref().unwrap().command,
            Command::RegisterCustomer { opening: None, .. }
        ));
        assert!(matches!(results[2], Err(BankError::ValidationError(_))));
        assert!(matches!(results[3], Err(BankError::ValidationError(_))));
        assert_eq!(
            results[4].as_ref().unwrap().command,
            Command::SetKycStatus {
                customer: 2,
                status: KycStatus::Verified,
            }
        );
    }

    #[test]
    fn test_reader_opening_balance_keeps_cents_exact() {
        let results = parse(
            "open_account, admin, , , 1, , , 100.005, , , savings, \n\
             open_account, admin, , , 1, , , -5, , , savings, \n\
             open_account, admin, , , 1, , , 0, , , savings, \n\
             open_account, admin, , , 1, , , , , , savings, ",
        );
        assert!(matches!(results[0], Err(BankError::ValidationError(_))));
        assert!(matches!(results[1], Err(BankError::ValidationError(_))));
        for zero in &results[2..] {
            assert!(matches!(
                zero.as_ref().unwrap().command,
                Command::OpenAccount { initial_deposit: None, .. }
            ));
        }
    }

    #[test]
    fn test_reader_short_rows() {
        let results = parse("approve_loan, loan_officer, , , , 4\nrecord_emi_payment, admin, , , , , 9");
        assert_eq!(results[0].as_ref().unwrap().command, Command::ApproveLoan(4));
        assert_eq!(results[1].as_ref().unwrap().command, Command::RecordEmiPayment(9));
    }

    #[test]
    fn test_reader_malformed_lines() {
        let results = parse(
            "explode, admin, 1\n\
             deposit, admin, 1, , , , , not_a_number\n\
             deposit, admin, 1\n\
             deposit, admin, 1, , , , , -5\n\
             deposit, nobody, 1, , , , , 5\n\
             deposit, admin, 1, , , , , 5",
        );
        assert_eq!(results.len(), 6);
        assert!(matches!(results[0], Err(BankError::CsvError(_))));
        assert!(matches!(results[1], Err(BankError::CsvError(_))));
        assert!(matches!(results[2], Err(BankError::ValidationError(_))));
        assert!(matches!(results[3], Err(BankError::ValidationError(_))));
        assert!(results[4].is_err());
        assert!(results[5].is_ok());
    }
}
