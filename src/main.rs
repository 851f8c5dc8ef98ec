use chrono::{Local, NaiveDate};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use pactkeeper::application::engine::EnforcementEngine;
use pactkeeper::config::{DEFAULT_DANGER_THRESHOLD, EngineConfig};
use pactkeeper::domain::payment::DEFAULT_PLATFORM_FEE_BPS;
use pactkeeper::domain::ports::{ContractStoreBox, TransactionFeedBox};
use pactkeeper::infrastructure::feed::MergedTransactionFeed;
use pactkeeper::infrastructure::in_memory::{InMemoryContractStore, InMemoryOrganizationDirectory};
use pactkeeper::infrastructure::payments::SimulatedPaymentExecutor;
#[cfg(feature = "storage-rocksdb")]
use pactkeeper::infrastructure::rocksdb::RocksDBStore;
use pactkeeper::interfaces::csv::contract_reader::ContractReader;
use pactkeeper::interfaces::csv::organization_reader::OrganizationReader;
use pactkeeper::interfaces::csv::report_writer::ReportWriter;
use pactkeeper::interfaces::csv::transaction_reader::CsvTransactionFeed;
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transactions CSV exported from the banking provider
    transactions: PathBuf,

    /// Manually entered transactions, merged into the feed
    #[arg(long)]
    mock_transactions: Option<PathBuf>,

    /// Contracts CSV to open before evaluating
    #[arg(long)]
    contracts: Option<PathBuf>,

    /// Organizations CSV seeding the penalty recipients
    #[arg(long)]
    organizations: Option<PathBuf>,

    /// Evaluation date (YYYY-MM-DD). Defaults to the local date.
    #[arg(long, env = "PACTKEEPER_TODAY")]
    today: Option<NaiveDate>,

    /// Seconds allowed to read one user's transactions
    #[arg(long, env = "PACTKEEPER_FEED_TIMEOUT_SECS", default_value_t = 30)]
    feed_timeout_secs: u64,

    /// Platform share of routed penalties, in basis points
    #[arg(long, env = "PACTKEEPER_PLATFORM_FEE_BPS", default_value_t = DEFAULT_PLATFORM_FEE_BPS)]
    platform_fee_bps: u32,

    /// Percentage of the limit shown as danger
    #[arg(long, env = "PACTKEEPER_DANGER_THRESHOLD", default_value_t = DEFAULT_DANGER_THRESHOLD)]
    danger_threshold: Decimal,

    /// Make the simulated payment provider decline every charge
    #[arg(long)]
    decline_charges: bool,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

impl Cli {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            feed_timeout: Duration::from_secs(self.feed_timeout_secs),
            platform_fee_bps: self.platform_fee_bps,
            danger_threshold: self.danger_threshold,
        }
    }
}

fn open_store(db_path: Option<&Path>) -> Result<ContractStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryContractStore::new()))
        }
        None => Ok(Box::new(InMemoryContractStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    let organizations = match &cli.organizations {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            OrganizationReader::new(file)
                .organizations()
                .collect::<pactkeeper::error::Result<Vec<_>>>()
                .into_diagnostic()?
        }
        None => Vec::new(),
    };

    let external: TransactionFeedBox = Box::new(CsvTransactionFeed::new(&cli.transactions));
    let feed: TransactionFeedBox = match &cli.mock_transactions {
        Some(path) => Box::new(MergedTransactionFeed::new(
            external,
            Box::new(CsvTransactionFeed::new(path)),
        )),
        None => external,
    };

    let payments = if cli.decline_charges {
        SimulatedPaymentExecutor::new().declining("Charges are disabled")
    } else {
        SimulatedPaymentExecutor::new()
    };

    let engine = EnforcementEngine::new(
        open_store(cli.db_path.as_deref())?,
        feed,
        Box::new(payments),
        Box::new(InMemoryOrganizationDirectory::new(organizations)),
        cli.engine_config(),
    );

    // Open contracts
    if let Some(path) = &cli.contracts {
        let file = File::open(path).into_diagnostic()?;
        for request in ContractReader::new(file).requests() {
            match request {
                Ok(request) => {
                    if let Err(e) = engine.create_contract(request).await {
                        warn!(error = %e, "Contract rejected");
                    }
                }
                Err(e) => warn!(error = %e, "Error reading contract"),
            }
        }
    }

    // Evaluate and report
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    for (user_id, report) in engine.evaluate_all(today).await.into_diagnostic()? {
        match report {
            Ok(report) => writer.write_report(&report).into_diagnostic()?,
            Err(e) if e.is_unevaluated() => {
                error!(user_id, error = %e, "Could not evaluate contracts");
                let contracts = engine.list_contracts(user_id).await.into_diagnostic()?;
                writer
                    .write_unevaluated(contracts.iter().filter(|c| !c.status.is_terminal()))
                    .into_diagnostic()?;
            }
            Err(e) => return Err(e).into_diagnostic(),
        }
    }
    writer.flush().into_diagnostic()?;

    Ok(())
}
