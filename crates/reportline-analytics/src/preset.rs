//! Built-in jobs, used when the config file defines none

use std::num::NonZeroU32;

use chrono::NaiveDate;
use reportline_core::query::DEFAULT_PAGE_SIZE;
use reportline_core::{DimensionFilter, FilterOperator};

use crate::config::{JobConfig, ReportConfig, SinkConfig, XlsxConfig};

/// Reporting span of the Universal Analytics property.
const SPAN_START: (i32, u32, u32) = (2017, 5, 15);
const SPAN_END: (i32, u32, u32) = (2023, 8, 7);

const PAGE_METRICS: [&str; 6] = [
    "ga:pageviews",
    "ga:uniquePageviews",
    "ga:avgTimeOnPage",
    "ga:entrances",
    "ga:bounceRate",
    "ga:exitRate",
];

const TRAFFIC_METRICS: [&str; 6] = [
    "ga:users",
    "ga:newUsers",
    "ga:sessions",
    "ga:bounceRate",
    "ga:pageviewsPerSession",
    "ga:avgSessionDuration",
];

const EVENT_DIMENSIONS: [&str; 4] = [
    "ga:pagePath",
    "ga:eventCategory",
    "ga:eventAction",
    "ga:eventLabel",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Weekly pages + events, shape-routed CSVs, JSON, xlsx
    AllPages,
    /// Pages + events over the whole span in one window
    AllPagesFull,
    /// Daily traffic by channel grouping
    AllTraffic,
    /// Daily device breakdown printed to stdout
    AllDevices,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Self::AllPages,
        Self::AllPagesFull,
        Self::AllTraffic,
        Self::AllDevices,
    ];

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "all_pages" => Some(Self::AllPages),
            "all_pages_full" => Some(Self::AllPagesFull),
            "all_traffic" => Some(Self::AllTraffic),
            "all_devices" => Some(Self::AllDevices),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AllPages => "all_pages",
            Self::AllPagesFull => "all_pages_full",
            Self::AllTraffic => "all_traffic",
            Self::AllDevices => "all_devices",
        }
    }

    pub fn job(self) -> JobConfig {
        match self {
            Self::AllPages => pages_job(NonZeroU32::new(7), &PAGE_METRICS, false),
            Self::AllPagesFull => {
                let mut numeric = PAGE_METRICS.to_vec();
                numeric.push("ga:totalEvents");
                pages_job(None, &numeric, true)
            }
            Self::AllTraffic => JobConfig {
                prefix: "UniversalAnalytics_AllTraffic".into(),
                json: true,
                xlsx: Some(xlsx(&TRAFFIC_METRICS, "ga:sessions")),
                reports: vec![report(&TRAFFIC_METRICS, &["ga:channelGrouping"])],
                ..daily_job()
            },
            Self::AllDevices => JobConfig {
                prefix: "UniversalAnalytics_AllDevices".into(),
                reports: vec![report(
                    &TRAFFIC_METRICS,
                    &[
                        "ga:channelGrouping",
                        "ga:deviceCategory",
                        "ga:browser",
                        "ga:operatingSystem",
                    ],
                )],
                sinks: vec![SinkConfig::Console],
                ..daily_job()
            },
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Every preset keyed by name.
pub fn preset_jobs() -> Vec<(String, JobConfig)> {
    Preset::ALL
        .iter()
        .map(|p| (p.name().to_string(), p.job()))
        .collect()
}

fn date((y, m, d): (i32, u32, u32)) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn report(metrics: &[&str], dimensions: &[&str]) -> ReportConfig {
    ReportConfig {
        metrics: strings(metrics),
        dimensions: strings(dimensions),
        filters: Vec::new(),
        page_size: DEFAULT_PAGE_SIZE,
    }
}

fn xlsx(numeric: &[&str], sort_by: &str) -> XlsxConfig {
    XlsxConfig {
        numeric: strings(numeric),
        sort_by: Some(sort_by.to_string()),
        descending: true,
    }
}

fn daily_job() -> JobConfig {
    JobConfig {
        start: date(SPAN_START),
        end: date(SPAN_END),
        step_days: NonZeroU32::new(1),
        prefix: String::new(),
        view_id: None,
        fail_fast: false,
        json: false,
        xlsx: None,
        reports: Vec::new(),
        sinks: Vec::new(),
    }
}

/// Pages (query strings excluded) plus events per page, one CSV each.
fn pages_job(step_days: Option<NonZeroU32>, numeric: &[&str], events_xlsx: bool) -> JobConfig {
    let mut pages = report(&PAGE_METRICS, &["ga:pagePath"]);
    pages.filters.push(
        DimensionFilter::new("ga:pagePath", FilterOperator::Regexp, ["\\?.*"]).negated(),
    );
    let events = report(&["ga:totalEvents"], &EVENT_DIMENSIONS);

    JobConfig {
        step_days,
        prefix: "UniversalAnalytics_AllPages".into(),
        json: true,
        xlsx: Some(xlsx(numeric, "ga:pageviews")),
        reports: vec![pages, events],
        sinks: vec![
            SinkConfig::Csv {
                suffix: String::new(),
                shape: Some(strings(&["ga:pagePath"])),
                delimiter: ',',
                xlsx: true,
            },
            SinkConfig::Csv {
                suffix: "_Events".into(),
                shape: Some(strings(&EVENT_DIMENSIONS)),
                delimiter: ',',
                xlsx: events_xlsx,
            },
        ],
        ..daily_job()
    }
}
