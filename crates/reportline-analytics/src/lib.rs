//! Reportline analytics - report jobs over the Analytics Reporting API
//!
//! This crate turns configured jobs into windowed, resumable fetches:
//! the batchGet client, job configuration, built-in presets, the job
//! runner and its summary.

pub mod api;
pub mod config;
pub mod preset;
pub mod runner;
pub mod stats;

// Re-exports
pub use api::{AnalyticsClient, DEFAULT_API_URL};
pub use config::{JobConfig, ReportConfig, SinkConfig, XlsxConfig};
pub use preset::{Preset, preset_jobs};
pub use runner::{RunOptions, job_dir, run_job};
pub use stats::{JobSummary, RunSummary};
