use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickbooks_export::desktop::DesktopSession;
use quickbooks_export::files::FsWatcher;
use quickbooks_export::models::{Document, DocumentQueue};
use quickbooks_export::workflow::{save_invoices, save_reports};
use quickbooks_export::EngineConfig;

#[derive(Parser)]
#[command(version, about = "Export QuickBooks invoices and memorized reports to files")]
struct Cli {
    /// Directory the exports are written to
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print invoices to PDF
    Invoices {
        /// Invoice numbers, exported in order
        #[arg(required_unless_present = "queue")]
        numbers: Vec<String>,
        /// JSON array of documents instead of numbers
        #[arg(long)]
        queue: Option<PathBuf>,
    },
    /// Export memorized reports to CSV
    Reports {
        /// Memorized report names, exported in order
        #[arg(required_unless_present = "queue")]
        names: Vec<String>,
        #[arg(long)]
        queue: Option<PathBuf>,
    },
}

fn default_export_dir() -> PathBuf {
    dirs::document_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("QuickBooks Exports")
}

fn load_queue(
    path: Option<PathBuf>,
    identifiers: Vec<String>,
    make: impl Fn(String) -> Document,
) -> anyhow::Result<DocumentQueue> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let documents: Vec<Document> = serde_json::from_str(&raw)?;
            Ok(documents.into())
        }
        None => Ok(identifiers.into_iter().map(make).collect()),
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = cli.dir.unwrap_or_else(default_export_dir);
    std::fs::create_dir_all(&dir)?;

    let config = EngineConfig::from_env();
    tracing::debug!("Engine config: {:?}", config);
    let mut session = DesktopSession::connect(config)?;
    let watcher = FsWatcher;

    let report = match cli.command {
        Command::Invoices { numbers, queue } => {
            let mut queue = load_queue(queue, numbers, |n| Document::invoice(n, &dir))?;
            save_invoices(&mut session, &watcher, &mut queue)?
        }
        Command::Reports { names, queue } => {
            let mut queue = load_queue(queue, names, |n| Document::report(n, &dir))?;
            save_reports(&mut session, &watcher, &mut queue)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Export failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
