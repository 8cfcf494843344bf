use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use smsrelay::application::coordinator::Coordinator;
use smsrelay::config::AppConfig;
use smsrelay::domain::ports::Stores;
use smsrelay::domain::pricing;
use smsrelay::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use smsrelay::infrastructure::rocksdb::RocksDBStore;
use smsrelay::interfaces::csv::report_writer::{ReportRow, ReportWriter};
use smsrelay::interfaces::csv::request_reader::RequestReader;
use smsrelay::logging;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Use the simulated SMS provider even when no credentials are set.
    #[arg(long, global = true)]
    mock_sms: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Send every request in a CSV file and print the outcome report
    Send { input: PathBuf },
    /// Price a message without sending it
    Cost { content: String },
    /// Total paid and refunded for a user
    Summary { user: String },
    /// A user's bills, newest first
    Bills { user: String },
    /// A user's messages, newest first
    Messages { user: String },
    /// Cancel an unpaid order
    Cancel { user: String, order: Uuid },
    /// Client-side payment parameters for an unpaid order
    PayParams { user: String, order: Uuid },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    if let Command::Cost { content } = &cli.command {
        println!(
            "{} ({} chars, {} units)",
            pricing::message_cost(content),
            pricing::char_count(content),
            pricing::billing_units(content)
        );
        return Ok(());
    }

    let config = AppConfig::from_env(cli.mock_sms).into_diagnostic()?;
    let stores = open_stores(cli.db_path.or(config.db_path.clone()))?;
    let payments = config.payment.build().into_diagnostic()?;
    let sms = config.sms.build().into_diagnostic()?;
    let coordinator = Coordinator::new(stores, payments, sms);

    match cli.command {
        Command::Send { input } => send_all(&coordinator, input).await?,
        Command::Summary { user } => {
            let summary = coordinator.billing().summarize(&user).await.into_diagnostic()?;
            print_json(&summary)?;
        }
        Command::Bills { user } => {
            let bills = coordinator.billing().list(&user).await.into_diagnostic()?;
            print_json(&bills)?;
        }
        Command::Messages { user } => {
            let messages = coordinator.messages(&user).await.into_diagnostic()?;
            print_json(&messages)?;
        }
        Command::Cancel { user, order } => {
            let order = coordinator.cancel_order(&user, order).await.into_diagnostic()?;
            print_json(&order)?;
        }
        Command::PayParams { user, order } => {
            let params = coordinator
                .client_pay_params(&user, order)
                .await
                .into_diagnostic()?;
            print_json(&params)?;
        }
        Command::Cost { .. } => {}
    }

    coordinator.shutdown().await;
    Ok(())
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Stores::shared(RocksDBStore::open(path).into_diagnostic()?)),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Stores::shared(InMemoryStore::new()))
        }
        None => Ok(Stores::shared(InMemoryStore::new())),
    }
}

async fn send_all(coordinator: &Coordinator, input: PathBuf) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let reader = RequestReader::new(file);

    // Accepted messages are reported once their dispatch has settled.
    let mut accepted: Vec<(String, Uuid)> = Vec::new();
    let mut rejected = Vec::new();
    for request in reader.requests() {
        match request {
            Ok(request) => {
                let user = request.user_id.clone();
                let cost = pricing::message_cost(&request.content);
                match coordinator.send(request).await {
                    Ok(message) => accepted.push((user, message.id)),
                    Err(e) => {
                        eprintln!("Error processing request: {}", e);
                        rejected.push(ReportRow::rejected(&user, cost, e));
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading request: {}", e);
            }
        }
    }

    coordinator.drain().await;

    let mut rows = Vec::with_capacity(accepted.len() + rejected.len());
    for (user, message_id) in accepted {
        let message = coordinator.message(&user, message_id).await.into_diagnostic()?;
        let order = coordinator.order(&user, message.order_id).await.into_diagnostic()?;
        rows.push(ReportRow::settled(&message, &order));
    }
    rows.extend(rejected);

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_rows(rows).into_diagnostic()?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
