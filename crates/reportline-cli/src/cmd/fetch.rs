//! Fetch subcommand - run report jobs window by window

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Args;

use reportline_analytics::{AnalyticsClient, JobConfig, RunOptions, RunSummary, run_job};
use reportline_core::{SharedProgress, is_shutdown_requested};
use reportline_store::Ledger;

use crate::config::{Config, TOKEN_ENV};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Jobs to run (default: every configured job)
    pub jobs: Vec<String>,

    /// Ignore recorded progress and refetch every window
    #[arg(long)]
    pub force: bool,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: FetchArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let jobs = select_jobs(config.jobs(), &args.jobs)?;
    for (name, job) in &jobs {
        for warning in job.validate(name)? {
            log::warn!("{warning}");
        }
    }

    let token = config.access_token().with_context(|| {
        format!("No access token: set ${TOKEN_ENV} or [api] access_token in the config")
    })?;
    let mut client = AnalyticsClient::new(&config.api.url, token, &config.http())
        .context("Failed to build HTTP client")?;
    log::debug!("Requesting reports from {}", client.endpoint());

    let output_dir = args
        .output
        .unwrap_or_else(|| config.output.dir.clone());
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Cannot create output directory {}", output_dir.display()))?;
    let mut ledger = Ledger::open(&output_dir)?;

    let options = RunOptions {
        output_dir: output_dir.clone(),
        view_id: config.api.view_id.clone(),
        force: args.force,
    };

    log::info!(
        "reportline fetch: {} job(s), output {}{}",
        jobs.len(),
        output_dir.display(),
        if args.force { ", forced" } else { "" }
    );

    let mut run = RunSummary::default();
    for (name, job) in &jobs {
        if is_shutdown_requested() {
            break;
        }
        let summary = run_job(name, job, &mut client, &mut ledger, &options, progress)
            .with_context(|| format!("Job {name} stopped"))?;
        run.jobs.push(summary);
    }

    if progress.is_tty() {
        run.print();
    } else {
        run.log();
    }

    if run.interrupted() || is_shutdown_requested() {
        log::warn!("Interrupted; rerun to resume from the ledger");
        return Ok(ExitCode::from(130));
    }
    if run.failed() > 0 {
        log::error!("{} window(s) failed", run.failed());
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

/// Jobs named on the command line, in command-line order; all jobs when none.
fn select_jobs(
    available: Vec<(String, JobConfig)>,
    requested: &[String],
) -> Result<Vec<(String, JobConfig)>> {
    if requested.is_empty() {
        return Ok(available);
    }
    let mut selected = Vec::with_capacity(requested.len());
    for name in requested {
        match available.iter().find(|(n, _)| n == name) {
            Some(job) => selected.push(job.clone()),
            None => {
                let names: Vec<&str> = available.iter().map(|(n, _)| n.as_str()).collect();
                bail!("Unknown job {name:?} (available: {})", names.join(", "));
            }
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportline_analytics::preset_jobs;

    #[test]
    fn no_names_selects_everything() {
        let jobs = select_jobs(preset_jobs(), &[]).unwrap();
        assert_eq!(jobs.len(), preset_jobs().len());
    }

    #[test]
    fn named_jobs_in_given_order() {
        let jobs = select_jobs(
            preset_jobs(),
            &["all_traffic".to_string(), "all_pages".to_string()],
        )
        .unwrap();
        let names: Vec<&str> = jobs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["all_traffic", "all_pages"]);
    }

    #[test]
    fn unknown_job_lists_alternatives() {
        let err = select_jobs(preset_jobs(), &["ua_pages".to_string()]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ua_pages"));
        assert!(msg.contains("all_devices"));
    }
}
