//! CSV → one-sheet `.xlsx`, with numeric coercion and sorting.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rust_xlsxwriter::{Format, Workbook};

use crate::records::{ColumnKind, infer_kind};
use crate::table::{Table, write_atomic};

/// Excel sheet limits
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLS: usize = 16_384;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XlsxOptions {
    /// Columns coerced to numbers (absent ones are ignored)
    pub numeric: Vec<String>,
    /// Sort key; no sort when `None` or absent from the input
    pub sort_by: Option<String>,
    pub descending: bool,
}

impl Default for XlsxOptions {
    fn default() -> Self {
        Self {
            numeric: Vec::new(),
            sort_by: None,
            descending: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XlsxSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// Numeric values that could not be parsed and were left empty
    pub unparsed: usize,
    pub sorted: bool,
}

/// Parse a numeric cell: grouping commas stripped, surrounding whitespace
/// ignored. Non-finite or unparseable values are `None`.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|&c| c != ',').collect();
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    fn compare(&self, other: &Cell, descending: bool) -> Ordering {
        let ord = match (self, other) {
            // Missing sorts last in either direction
            (Cell::Missing, Cell::Missing) => return Ordering::Equal,
            (Cell::Missing, _) => return Ordering::Greater,
            (_, Cell::Missing) => return Ordering::Less,
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Number(_), Cell::Text(_)) => Ordering::Less,
            (Cell::Text(_), Cell::Number(_)) => Ordering::Greater,
        };
        if descending { ord.reverse() } else { ord }
    }
}

/// How the cells of one column are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    /// Listed in the options: grouping commas stripped, failures counted
    Declared,
    /// Every non-empty value already parses as a number
    Inferred,
    Text,
}

/// Typed sheet built from a table.
struct Sheet {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
    unparsed: usize,
}

impl Sheet {
    fn from_table(table: Table, numeric: &[String]) -> Self {
        for name in numeric {
            if !table.header.contains(name) {
                log::debug!("numeric column {name} not present, skipped");
            }
        }
        let coercions: Vec<Coercion> = table
            .header
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if numeric.iter().any(|n| n == h) {
                    Coercion::Declared
                } else if infer_kind(table.rows.iter().map(|r| r[i].as_str())) != ColumnKind::Text {
                    Coercion::Inferred
                } else {
                    Coercion::Text
                }
            })
            .collect();

        let mut unparsed = 0;
        let rows = table
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&coercions)
                    .map(|(raw, &coercion)| match coercion {
                        Coercion::Text => Cell::Text(raw),
                        Coercion::Inferred => raw
                            .parse::<f64>()
                            .map_or(Cell::Missing, Cell::Number),
                        Coercion::Declared => match coerce_numeric(&raw) {
                            Some(v) => Cell::Number(v),
                            None => {
                                if !raw.trim().is_empty() {
                                    unparsed += 1;
                                }
                                Cell::Missing
                            }
                        },
                    })
                    .collect()
            })
            .collect();

        Self {
            header: table.header,
            rows,
            unparsed,
        }
    }

    /// Stable sort on `key`. Returns false if the column is absent.
    fn sort_by(&mut self, key: &str, descending: bool) -> bool {
        let Some(idx) = self.header.iter().position(|h| h == key) else {
            log::warn!("sort column {key} not present, rows left in input order");
            return false;
        };
        self.rows
            .sort_by(|a, b| a[idx].compare(&b[idx], descending));
        true
    }

    fn save(&self, path: &Path) -> Result<()> {
        if self.rows.len() + 1 > MAX_ROWS {
            bail!(
                "{} rows do not fit in one sheet (max {})",
                self.rows.len(),
                MAX_ROWS - 1
            );
        }
        if self.header.len() > MAX_COLS {
            bail!(
                "{} columns do not fit in one sheet (max {MAX_COLS})",
                self.header.len()
            );
        }

        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let worksheet = workbook.add_worksheet();

        for (col, name) in self.header.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &bold)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Text(s) if !s.is_empty() => {
                        worksheet.write_string(r, col as u16, s)?;
                    }
                    Cell::Number(v) => {
                        worksheet.write_number(r, col as u16, *v)?;
                    }
                    Cell::Text(_) | Cell::Missing => {}
                }
            }
        }

        workbook
            .save(path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        Ok(())
    }
}

/// Spreadsheet path for a CSV: same stem, `.xlsx` extension.
pub fn xlsx_path(input: &Path) -> PathBuf {
    input.with_extension("xlsx")
}

/// Convert `input` into `{stem}.xlsx` next to it.
pub fn csv_to_xlsx(input: &Path, options: &XlsxOptions) -> Result<XlsxSummary> {
    csv_to_xlsx_at(input, &xlsx_path(input), options)
}

/// Convert `input` into a spreadsheet at `output`.
pub fn csv_to_xlsx_at(input: &Path, output: &Path, options: &XlsxOptions) -> Result<XlsxSummary> {
    let table = Table::read(input)?;
    let mut sheet = Sheet::from_table(table, &options.numeric);
    let sorted = match &options.sort_by {
        Some(key) => sheet.sort_by(key, options.descending),
        None => false,
    };

    write_atomic(output, |tmp| sheet.save(tmp))?;

    if sheet.unparsed > 0 {
        log::warn!(
            "{}: {} numeric values could not be parsed, left empty",
            input.display(),
            sheet.unparsed
        );
    }
    log::info!("Saved {} ({} rows)", output.display(), sheet.rows.len());
    Ok(XlsxSummary {
        path: output.to_path_buf(),
        rows: sheet.rows.len(),
        unparsed: sheet.unparsed,
        sorted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn numeric(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn coerce_strips_grouping() {
        assert_eq!(coerce_numeric("1,234"), Some(1234.0));
        assert_eq!(coerce_numeric(" 12.5 "), Some(12.5));
        assert_eq!(coerce_numeric("n/a"), None);
        assert_eq!(coerce_numeric(""), None);
        assert_eq!(coerce_numeric("inf"), None);
    }

    #[test]
    fn absent_numeric_column_is_skipped() {
        let sheet = Sheet::from_table(
            table(&["ga:pagePath", "ga:pageviews"], &[&["/a", "1,234"]]),
            &numeric(&["ga:pageviews", "ga:exitRate"]),
        );
        assert_eq!(sheet.rows[0][1], Cell::Number(1234.0));
        assert_eq!(sheet.unparsed, 0);
    }

    #[test]
    fn unparseable_becomes_missing() {
        let sheet = Sheet::from_table(
            table(&["v"], &[&["n/a"], &[""]]),
            &numeric(&["v"]),
        );
        assert_eq!(sheet.rows[0][0], Cell::Missing);
        assert_eq!(sheet.rows[1][0], Cell::Missing);
        // Only the non-empty value counts as unparsed
        assert_eq!(sheet.unparsed, 1);
    }

    #[test]
    fn sort_descending_missing_last() {
        let mut sheet = Sheet::from_table(
            table(
                &["p", "v"],
                &[&["/a", "5"], &["/b", "n/a"], &["/c", "1,000"], &["/d", "7"]],
            ),
            &numeric(&["v"]),
        );
        assert!(sheet.sort_by("v", true));
        let order: Vec<&Cell> = sheet.rows.iter().map(|r| &r[0]).collect();
        assert_eq!(
            order,
            vec![
                &Cell::Text("/c".into()),
                &Cell::Text("/d".into()),
                &Cell::Text("/a".into()),
                &Cell::Text("/b".into()),
            ]
        );
    }

    #[test]
    fn sort_ascending_keeps_missing_last() {
        let mut sheet = Sheet::from_table(
            table(&["v"], &[&[""], &["3"], &["1"]]),
            &numeric(&["v"]),
        );
        sheet.sort_by("v", false);
        assert_eq!(sheet.rows[0][0], Cell::Number(1.0));
        assert_eq!(sheet.rows[2][0], Cell::Missing);
    }

    #[test]
    fn sort_on_absent_column_keeps_order() {
        let mut sheet = Sheet::from_table(table(&["v"], &[&["1"], &["3"]]), &[]);
        assert!(!sheet.sort_by("ga:pageviews", true));
        assert_eq!(sheet.rows[0][0], Cell::Number(1.0));
    }

    #[test]
    fn undeclared_numeric_columns_are_written_as_numbers() {
        let sheet = Sheet::from_table(
            table(
                &["ga:pagePath", "ga:totalEvents", "ga:avgTime", "ga:label"],
                &[&["/a", "12", "1.5", "7"], &["/b", "", "2", "intro"], &["/c", "3", "0", "9"]],
            ),
            &[],
        );
        assert_eq!(sheet.rows[0][1], Cell::Number(12.0));
        assert_eq!(sheet.rows[1][1], Cell::Missing);
        assert_eq!(sheet.rows[0][2], Cell::Number(1.5));
        assert_eq!(sheet.rows[0][3], Cell::Text("7".into()));
        assert_eq!(sheet.rows[1][3], Cell::Text("intro".into()));
        assert_eq!(sheet.rows[0][0], Cell::Text("/a".into()));
        assert_eq!(sheet.unparsed, 0);
    }

    #[test]
    fn grouped_digits_stay_text_unless_declared() {
        let sheet = Sheet::from_table(table(&["v"], &[&["1,234"], &["5"]]), &[]);
        assert_eq!(sheet.rows[0][0], Cell::Text("1,234".into()));
        assert_eq!(sheet.rows[1][0], Cell::Text("5".into()));
    }

    #[test]
    fn writes_xlsx_next_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pages_2023-01-01_to_2023-01-07.csv");
        std::fs::write(&input, "ga:pagePath,ga:pageviews\n/a,2\n/b,\"1,500\"\n").unwrap();

        let summary = csv_to_xlsx(
            &input,
            &XlsxOptions {
                numeric: numeric(&["ga:pageviews"]),
                sort_by: Some("ga:pageviews".into()),
                descending: true,
            },
        )
        .unwrap();

        assert_eq!(summary.path, dir.path().join("pages_2023-01-01_to_2023-01-07.xlsx"));
        assert_eq!(summary.rows, 2);
        assert!(summary.sorted);
        let bytes = std::fs::read(&summary.path).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
        assert!(!dir.path().join("pages_2023-01-01_to_2023-01-07.xlsx.tmp").exists());
    }
}
