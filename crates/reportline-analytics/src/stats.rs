//! Run statistics and the end-of-run summary table.
//!
//! - Job-level: [`JobSummary`], one per fetched job
//! - Run-level: [`RunSummary`], printed as a table in TTY mode and logged
//!   otherwise

use std::time::Duration;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use reportline_core::fmt_num;

/// Outcome counters for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub job: String,
    pub windows: usize,
    /// Fetched to completion in this run
    pub completed: usize,
    /// Of `completed`, how many picked up from a ledger cursor
    pub resumed: usize,
    /// Already complete in the ledger
    pub skipped: usize,
    pub failed: usize,
    pub pages: usize,
    pub rows: usize,
    /// Window label and error, per failed window
    pub failures: Vec<(String, String)>,
    /// Stopped by a shutdown request
    pub interrupted: bool,
    /// Stopped by `fail_fast`
    pub aborted: bool,
    pub elapsed: Duration,
}

impl JobSummary {
    pub fn new(job: impl Into<String>, windows: usize) -> Self {
        Self {
            job: job.into(),
            windows,
            ..Default::default()
        }
    }

    /// Windows neither finished nor failed (after an interrupt or abort).
    pub fn pending(&self) -> usize {
        self.windows
            .saturating_sub(self.completed + self.skipped + self.failed)
    }

    pub fn log(&self) {
        log::info!(
            "{}: {}/{} windows complete ({} skipped, {} resumed, {} failed), {} pages, {} rows [{:.1}s]",
            self.job,
            self.completed + self.skipped,
            self.windows,
            self.skipped,
            self.resumed,
            self.failed,
            fmt_num(self.pages),
            fmt_num(self.rows),
            self.elapsed.as_secs_f64()
        );
        for (window, error) in &self.failures {
            log::error!("{}: {window} failed: {error}", self.job);
        }
    }
}

/// All jobs of one `fetch` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub jobs: Vec<JobSummary>,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.jobs.iter().map(|j| j.failed).sum()
    }

    pub fn interrupted(&self) -> bool {
        self.jobs.iter().any(|j| j.interrupted)
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Job")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Windows").fg(Color::Cyan),
                Cell::new("Done").fg(Color::Cyan),
                Cell::new("Skipped").fg(Color::Cyan),
                Cell::new("Failed").fg(Color::Cyan),
                Cell::new("Pages").fg(Color::Cyan),
                Cell::new("Rows").fg(Color::Cyan),
                Cell::new("Time").fg(Color::Cyan),
            ]);

        for job in &self.jobs {
            let failed = Cell::new(job.failed);
            let failed = if job.failed > 0 {
                failed.fg(Color::Red)
            } else {
                failed
            };
            let mut done = format!("{}", job.completed);
            if job.resumed > 0 {
                done.push_str(&format!(" ({} resumed)", job.resumed));
            }
            let name = if job.interrupted {
                format!("{} (interrupted)", job.job)
            } else if job.aborted {
                format!("{} (aborted)", job.job)
            } else {
                job.job.clone()
            };
            table.add_row(vec![
                Cell::new(name),
                Cell::new(job.windows),
                Cell::new(done).fg(Color::Green),
                Cell::new(job.skipped),
                failed,
                Cell::new(fmt_num(job.pages)),
                Cell::new(fmt_num(job.rows)),
                Cell::new(format!("{:.1}s", job.elapsed.as_secs_f64())),
            ]);
        }

        let mut out = format!("\n{table}");
        for job in &self.jobs {
            for (window, error) in &job.failures {
                out.push_str(&format!("\n  {} {window}: {error}", job.job));
            }
        }
        out
    }

    pub fn print(&self) {
        eprintln!("{}", self.format_table());
    }

    pub fn log(&self) {
        for job in &self.jobs {
            job.log();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> JobSummary {
        JobSummary {
            completed: 3,
            resumed: 1,
            skipped: 2,
            failed: 1,
            pages: 12_000,
            rows: 1_234_567,
            failures: vec![("2023-01-08_to_2023-01-14".into(), "HTTP 429: quota".into())],
            ..JobSummary::new("all_pages", 8)
        }
    }

    #[test]
    fn pending_windows() {
        assert_eq!(summary().pending(), 2);
        assert_eq!(JobSummary::new("x", 0).pending(), 0);
    }

    #[test]
    fn run_totals() {
        let run = RunSummary {
            jobs: vec![summary(), JobSummary::new("all_traffic", 5)],
        };
        assert_eq!(run.failed(), 1);
        assert!(!run.interrupted());
    }

    #[test]
    fn table_lists_jobs_and_failures() {
        let run = RunSummary {
            jobs: vec![summary()],
        };
        let table = run.format_table();
        assert!(table.contains("all_pages"));
        assert!(table.contains("1,234,567"));
        assert!(table.contains("1 resumed"));
        assert!(table.contains("2023-01-08_to_2023-01-14: HTTP 429: quota"));
    }
}
