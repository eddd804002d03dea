//! Concatenate per-window CSV files into one.
//!
//! Each file's window is recovered from its name (`..._{start}_to_{end}.csv`)
//! and appended to every row as `start_date` / `end_date`. Files are read in
//! lexical order; the combined header is the union of all headers in
//! first-seen order, with missing cells left empty.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use regex::Regex;

use crate::table::Table;

pub const START_COLUMN: &str = "start_date";
pub const END_COLUMN: &str = "end_date";

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4}-\d{2}-\d{2})_to_(\d{4}-\d{2}-\d{2})").expect("valid date range regex")
});

/// Extract `(start, end)` from a file name such as
/// `UniversalAnalytics_AllPages_2023-01-01_to_2023-01-07.csv`.
pub fn date_range_from_name(name: &str) -> Option<(&str, &str)> {
    let caps = DATE_RANGE.captures(name)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineSummary {
    pub files: usize,
    /// `.csv` files without a date range in their name
    pub skipped: usize,
    pub rows: usize,
    pub columns: usize,
}

/// Combine every dated CSV in `input_dir` into `output`.
///
/// Only the top level of `input_dir` is scanned. `output` itself is never
/// read, even when it lives in `input_dir`.
pub fn combine_dir(input_dir: &Path, output: &Path) -> Result<CombineSummary> {
    let files = dated_csv_files(input_dir, output)?;
    let skipped = files.iter().filter(|(_, range)| range.is_none()).count();
    let dated: Vec<(PathBuf, (String, String))> = files
        .into_iter()
        .filter_map(|(path, range)| range.map(|r| (path, r)))
        .collect();
    if dated.is_empty() {
        bail!(
            "no CSV files with a date range in their name under {}",
            input_dir.display()
        );
    }

    let mut combined = Table::default();
    let mut parts = Vec::with_capacity(dated.len());
    for (path, range) in &dated {
        let table = Table::read(path)?;
        for name in &table.header {
            if !combined.header.contains(name) {
                combined.header.push(name.clone());
            }
        }
        log::debug!("{}: {} rows", path.display(), table.rows.len());
        parts.push((table, range));
    }
    combined.header.push(START_COLUMN.to_string());
    combined.header.push(END_COLUMN.to_string());
    let data_width = combined.header.len() - 2;

    for (table, (start, end)) in parts {
        let positions: Vec<usize> = table
            .header
            .iter()
            .map(|name| combined.header[..data_width].iter().position(|h| h == name))
            .collect::<Option<_>>()
            .context("header union is missing a column")?;
        for row in table.rows {
            let mut out = vec![String::new(); data_width];
            for (value, &pos) in row.into_iter().zip(&positions) {
                out[pos] = value;
            }
            out.push(start.clone());
            out.push(end.clone());
            combined.rows.push(out);
        }
    }

    combined.write(output)?;
    let summary = CombineSummary {
        files: dated.len(),
        skipped,
        rows: combined.rows.len(),
        columns: combined.header.len(),
    };
    log::info!(
        "Combined {} files ({} rows) into {}",
        summary.files,
        summary.rows,
        output.display()
    );
    Ok(summary)
}

type DatedFile = (PathBuf, Option<(String, String)>);

/// `.csv` files of `dir` in lexical order, with the date range of each name.
fn dated_csv_files(dir: &Path, exclude: &Path) -> Result<Vec<DatedFile>> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let pattern = dir.join("*.csv");
    let pattern_str = pattern.to_string_lossy();
    let exclude = std::fs::canonicalize(exclude).ok();

    let mut entries: Vec<PathBuf> = glob::glob(&pattern_str)
        .context("invalid glob pattern")?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .filter(|p| exclude.is_none() || std::fs::canonicalize(p).ok() != exclude)
        .collect();
    entries.sort();

    Ok(entries
        .into_iter()
        .map(|path| {
            let range = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(date_range_from_name)
                .map(|(s, e)| (s.to_string(), e.to_string()));
            if range.is_none() {
                log::debug!("{}: no date range in name, skipped", path.display());
            }
            (path, range)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_range_extraction() {
        assert_eq!(
            date_range_from_name("UniversalAnalytics_AllPages_2023-01-01_to_2023-01-07.csv"),
            Some(("2023-01-01", "2023-01-07"))
        );
        assert_eq!(date_range_from_name("combined_analytics.csv"), None);
        assert_eq!(date_range_from_name("x_2023-01-01_2023-01-07.csv"), None);
    }

    #[test]
    fn combine_appends_window_columns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("p_2023-01-08_to_2023-01-10.csv"),
            "ga:pagePath,ga:pageviews\n/b,5\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("p_2023-01-01_to_2023-01-07.csv"),
            "ga:pagePath,ga:pageviews\n/a,10\n/c,3\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x\n1\n").unwrap();

        let out = dir.path().join("out/combined.csv");
        let summary = combine_dir(dir.path(), &out).unwrap();
        assert_eq!(
            summary,
            CombineSummary {
                files: 2,
                skipped: 1,
                rows: 3,
                columns: 4
            }
        );

        let table = Table::read(&out).unwrap();
        assert_eq!(
            table.header,
            vec!["ga:pagePath", "ga:pageviews", "start_date", "end_date"]
        );
        // Lexical file order: the 01-01 window comes first
        assert_eq!(table.rows[0], vec!["/a", "10", "2023-01-01", "2023-01-07"]);
        assert_eq!(table.rows[2], vec!["/b", "5", "2023-01-08", "2023-01-10"]);
    }

    #[test]
    fn combine_unions_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_2023-01-01_to_2023-01-01.csv"),
            "ga:pagePath,ga:pageviews\n/a,1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a_2023-01-02_to_2023-01-02.csv"),
            "ga:pagePath,ga:totalEvents\n/b,7\n",
        )
        .unwrap();

        let out = dir.path().join("combined.csv");
        combine_dir(dir.path(), &out).unwrap();
        let table = Table::read(&out).unwrap();
        assert_eq!(
            table.header,
            vec![
                "ga:pagePath",
                "ga:pageviews",
                "ga:totalEvents",
                "start_date",
                "end_date"
            ]
        );
        assert_eq!(table.rows[1], vec!["/b", "", "7", "2023-01-02", "2023-01-02"]);
    }

    #[test]
    fn combine_does_not_read_its_own_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_2023-01-01_to_2023-01-01.csv"),
            "k,v\nx,1\n",
        )
        .unwrap();
        let out = dir.path().join("all_2023-01-01_to_2023-12-31.csv");
        combine_dir(dir.path(), &out).unwrap();
        // Second run must not pick up the first run's output
        let summary = combine_dir(dir.path(), &out).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.rows, 1);
    }

    #[test]
    fn combine_without_dated_files_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.csv"), "x\n1\n").unwrap();
        let err = combine_dir(dir.path(), &dir.path().join("c.csv")).unwrap_err();
        assert!(err.to_string().contains("no CSV files"));
    }
}
