//! Report query definitions
//!
//! A [`QueryDefinition`] is built once per job from configuration and never
//! mutated afterwards. Its serialized form is stable, so it doubles as the
//! query identity recorded in the progress ledger.

use serde::{Deserialize, Serialize};

/// Default rows per page requested from the source.
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// What to request from the report source for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    /// Data view the report is drawn from.
    pub view_id: String,
    /// Metric expressions, in output column order.
    pub metrics: Vec<String>,
    /// Dimension names, in output column order.
    pub dimensions: Vec<String>,
    /// Dimension filters (AND-ed within one clause).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<DimensionFilter>,
    /// Rows per page hint.
    pub page_size: u32,
}

impl QueryDefinition {
    pub fn new(view_id: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            metrics: Vec::new(),
            dimensions: Vec::new(),
            filters: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn metric(mut self, expression: impl Into<String>) -> Self {
        self.metrics.push(expression.into());
        self
    }

    pub fn dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn filter(mut self, filter: DimensionFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Output column names: dimensions followed by metrics.
    pub fn columns(&self) -> Vec<&str> {
        self.dimensions
            .iter()
            .chain(self.metrics.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Filter on a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionFilter {
    pub dimension: String,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Negate the match.
    #[serde(default)]
    pub not: bool,
    pub expressions: Vec<String>,
}

impl DimensionFilter {
    pub fn new(
        dimension: impl Into<String>,
        operator: FilterOperator,
        expressions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            dimension: dimension.into(),
            operator,
            not: false,
            expressions: expressions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

/// Match operators understood by the reporting API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterOperator {
    #[default]
    Regexp,
    BeginsWith,
    EndsWith,
    Partial,
    Exact,
    NumericEqual,
    NumericGreaterThan,
    NumericLessThan,
    InList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_preserves_order() {
        let q = QueryDefinition::new("123")
            .metric("ga:users")
            .metric("ga:sessions")
            .dimension("ga:channelGrouping")
            .dimension("ga:deviceCategory");
        assert_eq!(
            q.columns(),
            vec![
                "ga:channelGrouping",
                "ga:deviceCategory",
                "ga:users",
                "ga:sessions"
            ]
        );
        assert_eq!(q.page_size, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn operator_wire_names() {
        let json = serde_json::to_string(&FilterOperator::BeginsWith).unwrap();
        assert_eq!(json, "\"BEGINS_WITH\"");
        let op: FilterOperator = serde_json::from_str("\"REGEXP\"").unwrap();
        assert_eq!(op, FilterOperator::Regexp);
    }

    #[test]
    fn filter_defaults_when_deserialized() {
        let f: DimensionFilter =
            serde_json::from_str(r#"{"dimension": "ga:pagePath", "expressions": ["\\?.*"]}"#)
                .unwrap();
        assert_eq!(f.operator, FilterOperator::Regexp);
        assert!(!f.not);
        assert_eq!(f.expressions, vec!["\\?.*"]);
    }

    #[test]
    fn serialization_is_stable() {
        let q = QueryDefinition::new("1")
            .metric("ga:pageviews")
            .dimension("ga:pagePath")
            .filter(DimensionFilter::new("ga:pagePath", FilterOperator::Regexp, ["\\?.*"]).negated());
        let a = serde_json::to_string(&q).unwrap();
        let b = serde_json::to_string(&q.clone()).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"not\":true"));
    }
}
