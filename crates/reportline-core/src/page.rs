//! Report pages as returned by the source
//!
//! Field names follow the reporting API wire format. Fields this crate does
//! not interpret are kept in `extra` maps so a page re-serializes to the
//! document the source produced.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One source call's result: one [`Page`] per requested report, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub reports: Vec<Page>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    pub fn new(reports: Vec<Page>) -> Self {
        Self {
            reports,
            extra: Map::new(),
        }
    }

    /// Rows across every report.
    pub fn row_count(&self) -> usize {
        self.reports.iter().map(|r| r.data.rows.len()).sum()
    }
}

/// One page of one report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub column_header: ColumnHeader,
    #[serde(default)]
    pub data: ReportData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Page {
    /// Continuation cursor; an empty token means no more pages.
    pub fn cursor(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn dimensions(&self) -> &[String] {
        &self.column_header.dimensions
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.column_header
            .metric_header
            .metric_header_entries
            .iter()
            .map(|e| e.name.as_str())
    }

    /// Header line: dimension names then metric names.
    pub fn header(&self) -> Vec<&str> {
        self.dimensions()
            .iter()
            .map(String::as_str)
            .chain(self.metric_names())
            .collect()
    }

    /// Exact ordered equality of the dimension list.
    pub fn has_shape(&self, dimensions: &[String]) -> bool {
        self.dimensions() == dimensions
    }

    /// Data rows as (dimension values..., metric values...) of the first date range.
    pub fn records(&self) -> impl Iterator<Item = Vec<&str>> {
        self.data.rows.iter().map(ReportRow::fields)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metric_header: MetricHeader,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHeader {
    #[serde(default)]
    pub metric_header_entries: Vec<MetricHeaderEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricHeaderEntry {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<ReportRow>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// One value set per requested date range.
    #[serde(default)]
    pub metrics: Vec<DateRangeValues>,
}

impl ReportRow {
    pub fn fields(&self) -> Vec<&str> {
        let metrics = self.metrics.first().map_or(&[][..], |m| &m.values[..]);
        self.dimensions
            .iter()
            .chain(metrics.iter())
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRangeValues {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Build a page from plain parts. Used by tests and scripted sources.
pub fn page_from_parts(
    dimensions: &[&str],
    metrics: &[&str],
    rows: &[&[&str]],
    next_page_token: Option<&str>,
) -> Page {
    let n_dims = dimensions.len();
    Page {
        column_header: ColumnHeader {
            dimensions: dimensions.iter().map(|s| s.to_string()).collect(),
            metric_header: MetricHeader {
                metric_header_entries: metrics
                    .iter()
                    .map(|m| MetricHeaderEntry {
                        name: m.to_string(),
                        kind: Some("INTEGER".to_string()),
                    })
                    .collect(),
                extra: Map::new(),
            },
            extra: Map::new(),
        },
        data: ReportData {
            rows: rows
                .iter()
                .map(|row| {
                    let split = n_dims.min(row.len());
                    ReportRow {
                        dimensions: row[..split].iter().map(|s| s.to_string()).collect(),
                        metrics: vec![DateRangeValues {
                            values: row[split..].iter().map(|s| s.to_string()).collect(),
                            extra: Map::new(),
                        }],
                    }
                })
                .collect(),
            extra: Map::new(),
        },
        next_page_token: next_page_token.map(String::from),
        extra: Map::new(),
    }
}
