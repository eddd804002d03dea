//! CSV → JSON array of records

use std::path::Path;

use anyhow::Result;
use serde_json::{Map, Number, Value};

use crate::table::{Table, write_json_atomic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Integer,
    Float,
    Text,
}

/// Narrowest kind that holds every non-empty value of the column.
pub(crate) fn infer_kind<'a>(values: impl Iterator<Item = &'a str>) -> ColumnKind {
    let mut kind = ColumnKind::Integer;
    for value in values.filter(|v| !v.is_empty()) {
        if kind == ColumnKind::Integer && value.parse::<i64>().is_ok() {
            continue;
        }
        match value.parse::<f64>() {
            Ok(f) if f.is_finite() => kind = ColumnKind::Float,
            _ => return ColumnKind::Text,
        }
    }
    kind
}

fn to_value(raw: &str, kind: ColumnKind) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        ColumnKind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ColumnKind::Text => Value::String(raw.to_string()),
    }
}

/// Convert a table into records keyed by column name.
///
/// Each column is typed as a whole: all integers → numbers, all numeric with
/// at least one fraction → floats, anything else → strings. Empty cells are
/// `null` regardless of the column kind.
pub fn table_to_records(table: &Table) -> Vec<Value> {
    let kinds: Vec<ColumnKind> = (0..table.header.len())
        .map(|i| infer_kind(table.rows.iter().map(|r| r[i].as_str())))
        .collect();

    table
        .rows
        .iter()
        .map(|row| {
            let record: Map<String, Value> = table
                .header
                .iter()
                .zip(row)
                .zip(&kinds)
                .map(|((name, raw), &kind)| (name.clone(), to_value(raw, kind)))
                .collect();
            Value::Object(record)
        })
        .collect()
}

/// Read `input` and write its rows to `output` as a pretty JSON array.
/// Returns the number of records written.
pub fn csv_to_json(input: &Path, output: &Path) -> Result<usize> {
    let table = Table::read(input)?;
    let records = table_to_records(&table);
    let count = records.len();
    write_json_atomic(output, &Value::Array(records))?;
    log::info!(
        "Converted {} to {} ({count} records)",
        input.display(),
        output.display()
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(header: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn infers_column_kinds() {
        assert_eq!(infer_kind(["1", "2", ""].into_iter()), ColumnKind::Integer);
        assert_eq!(infer_kind(["1", "2.5"].into_iter()), ColumnKind::Float);
        assert_eq!(infer_kind(["1", "n/a"].into_iter()), ColumnKind::Text);
        assert_eq!(infer_kind(["1,234"].into_iter()), ColumnKind::Text);
        assert_eq!(infer_kind(std::iter::empty()), ColumnKind::Integer);
    }

    #[test]
    fn records_keep_column_order_and_types() {
        let t = table(
            &["ga:pagePath", "ga:pageviews", "ga:bounceRate", "start_date"],
            &[
                &["/a", "10", "50.5", "2023-01-01"],
                &["/b", "", "0", "2023-01-08"],
            ],
        );
        let records = table_to_records(&t);
        assert_eq!(
            records[0],
            json!({"ga:pagePath": "/a", "ga:pageviews": 10, "ga:bounceRate": 50.5, "start_date": "2023-01-01"})
        );
        assert_eq!(records[1]["ga:pageviews"], Value::Null);
        assert_eq!(records[1]["ga:bounceRate"], json!(0.0));

        let keys: Vec<&String> = records[0].as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["ga:pagePath", "ga:pageviews", "ga:bounceRate", "start_date"]
        );
    }

    #[test]
    fn csv_to_json_writes_array() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("c.csv");
        let output = dir.path().join("c.json");
        std::fs::write(&input, "k,v\na,1\nb,2\n").unwrap();

        assert_eq!(csv_to_json(&input, &output).unwrap(), 2);
        let value: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(value, json!([{"k": "a", "v": 1}, {"k": "b", "v": 2}]));
    }
}
