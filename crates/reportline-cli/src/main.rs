//! reportline - windowed, resumable analytics report exports
//!
//! Fetches paginated reports window by window into CSV/JSON files and
//! turns them into combined CSV, JSON records and spreadsheets.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "reportline")]
#[command(about = "Windowed, resumable analytics report exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./reportline.toml or ~/.config/reportline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch report windows for the given jobs (default: all)
    Fetch(cmd::fetch::FetchArgs),
    /// List configured jobs
    Jobs,
    /// Concatenate per-window CSV files into one CSV
    Combine(cmd::export::CombineArgs),
    /// Convert a CSV file into a JSON array of records
    ToJson(cmd::export::ToJsonArgs),
    /// Convert a CSV file into a sorted spreadsheet
    Xlsx(cmd::export::XlsxArgs),
    /// Show or clear fetch progress
    Ledger(cmd::ledger::LedgerArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(reportline_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug; progress bars show activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = is_tty && !cli.debug;
    if let Err(e) = reportline_core::init_logging(quiet, cli.debug, multi) {
        eprintln!("logger already initialized: {e}");
    }

    reportline_core::install_signal_handlers()?;

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Fetch(args) => cmd::fetch::run(args, &config, &progress),
        Command::Jobs => cmd::jobs::run(&config).map(|()| ExitCode::SUCCESS),
        Command::Combine(args) => cmd::export::combine(args).map(|()| ExitCode::SUCCESS),
        Command::ToJson(args) => cmd::export::to_json(args).map(|()| ExitCode::SUCCESS),
        Command::Xlsx(args) => cmd::export::xlsx(args).map(|()| ExitCode::SUCCESS),
        Command::Ledger(args) => cmd::ledger::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            cmd::print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
