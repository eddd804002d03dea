//! Export subcommands: `combine`, `to-json`, `xlsx`

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use reportline_core::fmt_num;
use reportline_export::{XlsxOptions, combine_dir, csv_to_json, csv_to_xlsx_at, xlsx_path};

use super::print_summary;

/// Default name of the combined CSV, written inside the input directory.
const COMBINED_FILE: &str = "combined_analytics.csv";

#[derive(Args, Debug)]
pub struct CombineArgs {
    /// Directory holding per-window CSV files
    pub input: PathBuf,

    /// Combined CSV (default: INPUT/combined_analytics.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ToJsonArgs {
    /// CSV file to convert
    pub input: PathBuf,

    /// JSON file (default: INPUT with a .json extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct XlsxArgs {
    /// CSV file to convert
    pub input: PathBuf,

    /// Columns written as numbers (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub numeric: Vec<String>,

    /// Column to sort rows by
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub ascending: bool,

    /// Spreadsheet file (default: INPUT with an .xlsx extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn combine(args: CombineArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| args.input.join(COMBINED_FILE));
    let summary = combine_dir(&args.input, &output)?;
    print_summary(
        "Combine",
        &[
            ("Files", summary.files.to_string()),
            ("Skipped (no date range)", summary.skipped.to_string()),
            ("Rows", fmt_num(summary.rows)),
            ("Columns", summary.columns.to_string()),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

pub fn to_json(args: ToJsonArgs) -> Result<()> {
    let output = args.output.unwrap_or_else(|| json_path(&args.input));
    let records = csv_to_json(&args.input, &output)?;
    print_summary(
        "To JSON",
        &[
            ("Records", fmt_num(records)),
            ("Output", output.display().to_string()),
        ],
    );
    Ok(())
}

pub fn xlsx(args: XlsxArgs) -> Result<()> {
    let output = args.output.unwrap_or_else(|| xlsx_path(&args.input));
    let options = XlsxOptions {
        numeric: args.numeric,
        sort_by: args.sort_by,
        descending: !args.ascending,
    };
    let summary = csv_to_xlsx_at(&args.input, &output, &options)?;
    let sort = match (&options.sort_by, summary.sorted) {
        (Some(key), true) => format!(
            "{key} ({})",
            if options.descending { "descending" } else { "ascending" }
        ),
        (Some(key), false) => format!("{key} not found, unsorted"),
        (None, _) => "unsorted".to_string(),
    };
    print_summary(
        "Spreadsheet",
        &[
            ("Rows", fmt_num(summary.rows)),
            ("Unparsed numbers", summary.unparsed.to_string()),
            ("Sort", sort),
            ("Output", summary.path.display().to_string()),
        ],
    );
    Ok(())
}

fn json_path(input: &Path) -> PathBuf {
    input.with_extension("json")
}
