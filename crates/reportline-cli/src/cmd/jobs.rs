//! `reportline jobs` - list configured jobs

use anyhow::Result;
use comfy_table::Cell;
use reportline_analytics::{JobConfig, SinkConfig};

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let mut table = super::table(&["Job", "Span", "Step", "Windows", "Reports", "Outputs"]);
    for (name, job) in config.jobs() {
        for warning in job.validate(&name)? {
            log::warn!("{warning}");
        }
        table.add_row(vec![
            Cell::new(&name),
            Cell::new(format!("{} → {}", job.start, job.end)),
            Cell::new(step_label(&job)),
            Cell::new(job.windows().count()),
            Cell::new(job.reports.len()),
            Cell::new(outputs(&job)),
        ]);
    }
    if config.using_presets() {
        eprintln!("No jobs configured, using built-in presets");
    }
    eprintln!("\n{table}");
    Ok(())
}

fn step_label(job: &JobConfig) -> String {
    match job.step_days {
        Some(days) if days.get() == 1 => "daily".to_string(),
        Some(days) if days.get() == 7 => "weekly".to_string(),
        Some(days) => format!("{days} days"),
        None => "whole span".to_string(),
    }
}

/// Output kinds of a job, e.g. `csv, csv_Events, json, xlsx`.
fn outputs(job: &JobConfig) -> String {
    let mut kinds: Vec<String> = job.sinks().iter().map(SinkConfig::name).collect();
    if job.json {
        kinds.push("json".into());
    }
    if job.xlsx.is_some() {
        kinds.push("xlsx".into());
    }
    kinds.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportline_analytics::Preset;

    #[test]
    fn step_labels() {
        assert_eq!(step_label(&Preset::AllTraffic.job()), "daily");
        assert_eq!(step_label(&Preset::AllPages.job()), "weekly");
        assert_eq!(step_label(&Preset::AllPagesFull.job()), "whole span");
    }

    #[test]
    fn output_kinds() {
        assert_eq!(
            outputs(&Preset::AllPages.job()),
            "csv, csv_Events, json, xlsx"
        );
        assert_eq!(outputs(&Preset::AllDevices.job()), "console");
    }
}
