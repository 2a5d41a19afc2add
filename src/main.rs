use bankcore::application::Bank;
use bankcore::config::Config;
use bankcore::domain::access::Principal;
use bankcore::domain::clock::SystemClock;
use bankcore::domain::ports::RecordStoreBox;
use bankcore::infrastructure::in_memory::InMemoryRecordStore;
use bankcore::interfaces::csv::command_reader::CommandReader;
use bankcore::interfaces::csv::report_writer::ReportWriter;
use bankcore::interfaces::dispatch;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Report {
    Customers,
    Accounts,
    Loans,
    Emis,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report printed to stdout once all commands have run
    #[arg(long, value_enum, default_value_t = Report::Accounts)]
    report: Report,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<RecordStoreBox> {
    use bankcore::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryRecordStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<RecordStoreBox> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryRecordStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).into_diagnostic()?,
        None => Config::default(),
    }
    .with_env()
    .into_diagnostic()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .into_diagnostic()?;
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    let bank = Bank::new(open_store(cli.db_path)?, &config, Arc::new(SystemClock));

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let (mut applied, mut rejected) = (0usize, 0usize);
    for (row, request) in reader.commands().enumerate() {
        let row = row + 1;
        match request {
            Ok(request) => match dispatch::execute(&bank, request).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(row, kind = ?e.kind(), retryable = e.is_retryable(), "Error processing command: {}", e);
                }
            },
            Err(e) => {
                rejected += 1;
                warn!(row, "Error reading command: {}", e);
            }
        }
    }
    info!(applied, rejected, "batch finished");

    let admin = Principal::admin();
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    match cli.report {
        Report::Customers => {
            let customers = bank.customers.customers(&admin).await.into_diagnostic()?;
            writer.write_customers(customers).into_diagnostic()?;
        }
        Report::Accounts => {
            let accounts = bank.accounts.accounts(&admin).await.into_diagnostic()?;
            writer.write_accounts(accounts).into_diagnostic()?;
        }
        Report::Loans => {
            let mut loans = bank.loans.loans(&admin, None).await.into_diagnostic()?;
            loans.sort_by_key(|l| l.id);
            writer.write_loans(loans).into_diagnostic()?;
        }
        Report::Emis => {
            let emis = bank.emi_payments.emis(&admin, None).await.into_diagnostic()?;
            writer.write_emis(emis, bank.ledger().today()).into_diagnostic()?;
        }
    }

    Ok(())
}
