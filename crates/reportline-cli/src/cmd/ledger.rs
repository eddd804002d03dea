//! `reportline ledger` - show or clear recorded fetch progress

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color};
use reportline_core::fmt_num;
use reportline_store::{Ledger, WindowProgress, WindowStatus};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// Only show this job
    pub job: Option<String>,

    /// Output directory holding the ledger (default: [output] dir)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Forget every window of JOB so the next fetch starts over
    #[arg(long, value_name = "JOB", conflicts_with = "job")]
    pub clear: Option<String>,
}

pub fn run(args: LedgerArgs, config: &Config) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| config.output.dir.clone());
    let mut ledger = Ledger::open(&dir)?;

    if let Some(job) = args.clear {
        let removed = ledger.clear_job(&job)?;
        eprintln!("Removed {removed} window(s) of {job} from {}", ledger.path().display());
        return Ok(());
    }

    let prefix = args.job.map(|job| format!("{job}/"));
    let entries: Vec<(&str, &WindowProgress)> = ledger
        .entries()
        .filter(|(key, _)| prefix.as_deref().map_or(true, |p| key.starts_with(p)))
        .collect();
    if entries.is_empty() {
        eprintln!("No recorded windows in {}", ledger.path().display());
        return Ok(());
    }

    let mut table = super::table(&["Window", "Status", "Pages", "Rows", "Updated", "Error"]);
    for (key, entry) in &entries {
        table.add_row(vec![
            Cell::new(key),
            status_cell(entry.status),
            Cell::new(entry.pages),
            Cell::new(fmt_num(entry.rows as usize)),
            Cell::new(entry.updated_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.error.as_deref().unwrap_or("")),
        ]);
    }
    eprintln!("\n{table}");

    let count = |status: WindowStatus| entries.iter().filter(|(_, e)| e.status == status).count();
    eprintln!(
        "{} complete, {} in progress, {} failed",
        count(WindowStatus::Complete),
        count(WindowStatus::InProgress),
        count(WindowStatus::Failed)
    );
    Ok(())
}

fn status_cell(status: WindowStatus) -> Cell {
    let cell = Cell::new(status);
    match status {
        WindowStatus::Complete => cell.fg(Color::Green),
        WindowStatus::InProgress => cell.fg(Color::Yellow),
        WindowStatus::Failed => cell.fg(Color::Red),
    }
}
