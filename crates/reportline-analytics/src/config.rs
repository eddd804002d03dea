//! Job definitions: what to request, over which span, into which files

use std::collections::BTreeSet;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use anyhow::ensure;
use chrono::NaiveDate;
use reportline_core::query::DEFAULT_PAGE_SIZE;
use reportline_core::{DateWindow, DateWindows, DimensionFilter, QueryDefinition};
use reportline_export::XlsxOptions;
use serde::{Deserialize, Serialize};

/// One configured pipeline: a report batch fetched window by window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub start: NaiveDate,
    /// Inclusive
    pub end: NaiveDate,
    /// Window length in days; absent means one window over the whole span
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_days: Option<NonZeroU32>,
    /// File name prefix, e.g. `UniversalAnalytics_AllPages`
    pub prefix: String,
    /// Overrides `[api] view_id` for this job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
    /// Abort the job at the first failed window
    #[serde(default)]
    pub fail_fast: bool,
    /// Also keep every raw response in `json/{prefix}_{window}.json`
    #[serde(default)]
    pub json: bool,
    /// Spreadsheet post-processing for CSV sinks that opt in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlsx: Option<XlsxConfig>,
    pub reports: Vec<ReportConfig>,
    /// Defaults to a single unshaped CSV sink
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// One report of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    pub metrics: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Vec<DimensionFilter>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// `{prefix}{suffix}_{start}_to_{end}.csv` in the job directory
    Csv {
        #[serde(default)]
        suffix: String,
        /// Only reports with exactly these dimensions are written
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shape: Option<Vec<String>>,
        #[serde(default = "default_delimiter")]
        delimiter: char,
        /// Convert to `.xlsx` once the window is complete (needs `[xlsx]`)
        #[serde(default = "default_true")]
        xlsx: bool,
    },
    /// Tab-separated rows on stdout
    Console,
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

impl SinkConfig {
    /// Plain CSV sink with no suffix or shape.
    pub fn csv() -> Self {
        Self::Csv {
            suffix: String::new(),
            shape: None,
            delimiter: default_delimiter(),
            xlsx: true,
        }
    }

    /// Name keying this sink's checkpoint in the ledger.
    pub fn name(&self) -> String {
        match self {
            Self::Csv { suffix, .. } => format!("csv{suffix}"),
            Self::Console => "console".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct XlsxConfig {
    #[serde(default)]
    pub numeric: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default = "default_true")]
    pub descending: bool,
}

impl XlsxConfig {
    pub fn options(&self) -> XlsxOptions {
        XlsxOptions {
            numeric: self.numeric.clone(),
            sort_by: self.sort_by.clone(),
            descending: self.descending,
        }
    }
}

impl JobConfig {
    /// Sinks to use, falling back to one plain CSV sink.
    pub fn sinks(&self) -> Vec<SinkConfig> {
        if self.sinks.is_empty() {
            vec![SinkConfig::csv()]
        } else {
            self.sinks.clone()
        }
    }

    /// Query definitions of the batch, in request order.
    pub fn queries(&self, default_view_id: &str) -> Vec<QueryDefinition> {
        let view_id = self.view_id.as_deref().unwrap_or(default_view_id);
        self.reports
            .iter()
            .map(|r| QueryDefinition {
                view_id: view_id.to_string(),
                metrics: r.metrics.clone(),
                dimensions: r.dimensions.clone(),
                filters: r.filters.clone(),
                page_size: r.page_size,
            })
            .collect()
    }

    /// Window step: the configured one, else the whole span.
    pub fn step(&self) -> NonZeroU32 {
        self.step_days.unwrap_or_else(|| {
            let span = (self.end - self.start).num_days() + 1;
            u32::try_from(span)
                .ok()
                .and_then(NonZeroU32::new)
                .unwrap_or(NonZeroU32::MIN)
        })
    }

    pub fn windows(&self) -> DateWindows {
        DateWindows::new(self.start, self.end, self.step())
    }

    /// CSV file of one sink for one window.
    pub fn csv_path(&self, dir: &Path, suffix: &str, window: &DateWindow) -> PathBuf {
        dir.join(format!("{}{suffix}_{}.csv", self.prefix, window.label()))
    }

    /// Newline-delimited JSON page log for one window.
    pub fn json_path(&self, dir: &Path, window: &DateWindow) -> PathBuf {
        dir.join("json")
            .join(format!("{}_{}.jsonl", self.prefix, window.label()))
    }

    /// Whether any output survives the run: a CSV sink or the JSON log.
    /// Console-only jobs have nothing to resume.
    pub fn has_durable_output(&self) -> bool {
        self.json || self.sinks().iter().any(|s| matches!(s, SinkConfig::Csv { .. }))
    }

    /// Check the job is runnable. Returns warnings for suspicious but valid
    /// settings.
    pub fn validate(&self, name: &str) -> anyhow::Result<Vec<String>> {
        let mut warnings = Vec::new();
        ensure!(
            !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains(['/', '\\']),
            "job name {name:?} must be usable as a directory name"
        );
        ensure!(!self.prefix.is_empty(), "job {name}: prefix is empty");
        ensure!(!self.reports.is_empty(), "job {name}: no reports configured");
        for (i, report) in self.reports.iter().enumerate() {
            ensure!(
                !report.metrics.is_empty(),
                "job {name}: report {i} has no metrics"
            );
            ensure!(report.page_size > 0, "job {name}: report {i} has page_size 0");
        }
        if self.end < self.start {
            warnings.push(format!(
                "job {name}: end {} is before start {}, nothing to fetch",
                self.end, self.start
            ));
        }

        let mut names = BTreeSet::new();
        for sink in self.sinks() {
            ensure!(
                names.insert(sink.name()),
                "job {name}: duplicate sink {}",
                sink.name()
            );
            if let SinkConfig::Csv {
                shape, delimiter, ..
            } = &sink
            {
                check_delimiter(name, *delimiter)?;
                if let Some(shape) = shape {
                    if !self.reports.iter().any(|r| &r.dimensions == shape) {
                        warnings.push(format!(
                            "job {name}: sink {} shape {shape:?} matches no report",
                            sink.name()
                        ));
                    }
                }
            }
        }
        if self.xlsx.is_some() && !self.sinks().iter().any(is_xlsx_sink) {
            warnings.push(format!("job {name}: [xlsx] set but no CSV sink opts in"));
        }
        Ok(warnings)
    }
}

fn is_xlsx_sink(sink: &SinkConfig) -> bool {
    matches!(sink, SinkConfig::Csv { xlsx: true, .. })
}

fn check_delimiter(job: &str, delimiter: char) -> anyhow::Result<()> {
    ensure!(
        delimiter.is_ascii() && delimiter != '\n' && delimiter != '"',
        "job {job}: delimiter {delimiter:?} must be a single ASCII character"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGES_JOB: &str = r#"
start = "2023-01-01"
end = "2023-01-10"
step_days = 7
prefix = "UniversalAnalytics_AllPages"
json = true
xlsx = { numeric = ["ga:pageviews"], sort_by = "ga:pageviews" }

[[reports]]
metrics = ["ga:pageviews"]
dimensions = ["ga:pagePath"]
filters = [{ dimension = "ga:pagePath", operator = "REGEXP", not = true, expressions = ["\\?.*"] }]

[[reports]]
metrics = ["ga:totalEvents"]
dimensions = ["ga:pagePath", "ga:eventCategory"]
page_size = 5000

[[sinks]]
kind = "csv"
shape = ["ga:pagePath"]

[[sinks]]
kind = "csv"
suffix = "_Events"
shape = ["ga:pagePath", "ga:eventCategory"]
xlsx = false
"#;

    fn pages_job() -> JobConfig {
        toml::from_str(PAGES_JOB).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_full_job() {
        let job = pages_job();
        assert_eq!(job.step_days, NonZeroU32::new(7));
        assert!(job.json);
        assert_eq!(job.reports[0].page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(job.reports[1].page_size, 5000);
        assert!(job.reports[0].filters[0].not);
        assert_eq!(job.sinks[1].name(), "csv_Events");
        let xlsx = job.xlsx.as_ref().unwrap();
        assert!(xlsx.descending);
        assert!(job.validate("all_pages").unwrap().is_empty());
    }

    #[test]
    fn step_zero_is_rejected() {
        let src = PAGES_JOB.replace("step_days = 7", "step_days = 0");
        assert!(toml::from_str::<JobConfig>(&src).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let src = PAGES_JOB.replace("json = true", "jsn = true");
        assert!(toml::from_str::<JobConfig>(&src).is_err());
    }

    #[test]
    fn queries_carry_view_and_order() {
        let job = pages_job();
        let queries = job.queries("150538750");
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].view_id, "150538750");
        assert_eq!(queries[1].dimensions, vec!["ga:pagePath", "ga:eventCategory"]);

        let overridden = JobConfig {
            view_id: Some("42".into()),
            ..job
        };
        assert_eq!(overridden.queries("150538750")[0].view_id, "42");
    }

    #[test]
    fn windows_follow_step() {
        let windows: Vec<DateWindow> = pages_job().windows().collect();
        assert_eq!(
            windows,
            vec![
                DateWindow::new(date(2023, 1, 1), date(2023, 1, 7)),
                DateWindow::new(date(2023, 1, 8), date(2023, 1, 10)),
            ]
        );
    }

    #[test]
    fn absent_step_is_whole_span() {
        let job = JobConfig {
            step_days: None,
            ..pages_job()
        };
        let windows: Vec<DateWindow> = job.windows().collect();
        assert_eq!(
            windows,
            vec![DateWindow::new(date(2023, 1, 1), date(2023, 1, 10))]
        );
    }

    #[test]
    fn output_paths() {
        let job = pages_job();
        let w = DateWindow::new(date(2023, 1, 1), date(2023, 1, 7));
        let dir = Path::new("data/all_pages");
        assert_eq!(
            job.csv_path(dir, "_Events", &w),
            Path::new("data/all_pages/UniversalAnalytics_AllPages_Events_2023-01-01_to_2023-01-07.csv")
        );
        assert_eq!(
            job.json_path(dir, &w),
            Path::new("data/all_pages/json/UniversalAnalytics_AllPages_2023-01-01_to_2023-01-07.jsonl")
        );
    }

    #[test]
    fn validation_errors_and_warnings() {
        let mut job = pages_job();
        job.reports[1].metrics.clear();
        assert!(job.validate("j").is_err());

        let mut job = pages_job();
        job.sinks.push(SinkConfig::Csv {
            suffix: "_Events".into(),
            shape: None,
            delimiter: ',',
            xlsx: false,
        });
        let err = job.validate("j").unwrap_err();
        assert!(err.to_string().contains("duplicate sink"));

        let mut job = pages_job();
        job.sinks = vec![SinkConfig::Csv {
            suffix: String::new(),
            shape: Some(vec!["ga:browser".into()]),
            delimiter: ',',
            xlsx: true,
        }];
        job.end = date(2022, 12, 31);
        let warnings = job.validate("j").unwrap();
        assert_eq!(warnings.len(), 2);

        assert!(pages_job().validate("../pages").is_err());
        assert!(pages_job().validate("").is_err());
    }

    #[test]
    fn console_only_job_has_no_durable_output() {
        let mut job = pages_job();
        assert!(job.has_durable_output());

        job.sinks = vec![SinkConfig::Console];
        assert!(job.has_durable_output(), "json log still written");

        job.json = false;
        assert!(!job.has_durable_output());
    }

    #[test]
    fn default_sink_is_plain_csv() {
        let mut job = pages_job();
        job.sinks.clear();
        assert_eq!(job.sinks(), vec![SinkConfig::csv()]);
    }
}
