mod config;
mod error;
mod extract;
mod loader;
mod records;
mod store;
mod verify;

use clap::{Parser, Subcommand};
use extract::DocKind;
use loader::{LineMode, LoadStats};
use std::path::Path;
use store::InvoiceStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "invoice_loader")]
#[command(about = "Load invoice/credit-note NDJSON records into SQLite", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the configured invoice and credit-note files
    Load,
    /// Report row counts and a sample row per table
    Verify,
    /// Load, then verify
    All,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let cli = Cli::parse();
    let cfg = config::Config::load_or_default(".config/loader.toml");
    let db = InvoiceStore::new(&cfg.db_path)?;

    let missing_input = match cli.command {
        Command::Load => run_load(&db, &cfg)?,
        Command::Verify => {
            verify::run_report(&db, cfg.sample_width)?;
            false
        }
        Command::All => {
            let missing = run_load(&db, &cfg)?;
            verify::run_report(&db, cfg.sample_width)?;
            missing
        }
    };

    if missing_input {
        std::process::exit(1);
    }
    Ok(())
}

fn run_load(db: &InvoiceStore, cfg: &config::Config) -> Result<bool, Box<dyn std::error::Error>> {
    let invoices = loader::load_file(
        db,
        DocKind::Invoice,
        Path::new(&cfg.invoices_file),
        LineMode::Append,
    )?;
    let credit_notes = loader::load_file(
        db,
        DocKind::CreditNote,
        Path::new(&cfg.credit_notes_file),
        LineMode::Append,
    )?;

    log_stats("invoices", &invoices);
    log_stats("credit notes", &credit_notes);

    let (inv, inv_lines, notes, note_lines) = db.get_counts()?;
    info!(
        invoices = inv,
        invoice_lines = inv_lines,
        credit_notes = notes,
        credit_note_lines = note_lines,
        "Database statistics"
    );

    Ok(invoices.missing_file || credit_notes.missing_file)
}

fn log_stats(stream: &str, stats: &LoadStats) {
    info!(
        stream = stream,
        headers = stats.headers,
        lines = stats.lines,
        skipped = stats.skipped_records,
        parse_failures = stats.parse_failures,
        "Load summary"
    );
}
