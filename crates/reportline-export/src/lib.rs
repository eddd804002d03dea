//! reportline-export: post-processing of per-window CSV output
//!
//! - [`combine`]: concatenate per-window CSVs into one file with
//!   `start_date`/`end_date` columns taken from each file name
//! - [`records`]: convert a CSV into a JSON array of records
//! - [`spreadsheet`]: coerce numeric columns, sort, and write `.xlsx`

pub mod combine;
pub mod records;
pub mod spreadsheet;
mod table;

pub use combine::{CombineSummary, combine_dir, date_range_from_name};
pub use records::csv_to_json;
pub use spreadsheet::{
    XlsxOptions, XlsxSummary, coerce_numeric, csv_to_xlsx, csv_to_xlsx_at, xlsx_path,
};
pub use table::Table;
