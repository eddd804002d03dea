//! Job execution: window by window fetch with ledger-backed resume
//!
//! ```text
//! for each window:
//!   ledger complete     → skip
//!   ledger in_progress  → roll sinks back to checkpoints, resume from cursors
//!   no entry / --force  → remove outputs, start fresh
//!   fetch pages → commit each page to the ledger → xlsx → complete
//! ```
//!
//! Jobs whose only sink is the console have nothing to resume, so they
//! bypass the ledger and refetch every run.
//!
//! A failed window is recorded and the job moves on, unless the job is
//! `fail_fast` or the source rejected the credentials.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use reportline_core::{
    CsvSink, Cursor, DateWindow, FetchError, Flow, JsonSink, ProgressContext, QueryDefinition,
    ReportSource, SinkError, SinkSet, TableSink, cleanup_tmp_files, fetch_window, fmt_num,
    is_shutdown_requested,
};
use reportline_export::{csv_to_xlsx, xlsx_path};
use reportline_store::{Ledger, WindowKey, WindowProgress, WindowStatus, query_identity, short_hash};

use crate::config::{JobConfig, SinkConfig};
use crate::stats::JobSummary;

/// Ledger name of the structured document sink.
const JSON_SINK: &str = "json";

/// Settings shared by every job of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root output directory; each job writes to `{output_dir}/{job}`
    pub output_dir: PathBuf,
    /// View id for jobs that don't set their own
    pub view_id: String,
    /// Ignore the ledger and refetch every window
    pub force: bool,
}

#[derive(Debug)]
enum WindowOutcome {
    Skipped,
    Completed { pages: usize, rows: usize, resumed: bool },
    Interrupted { pages: usize, rows: usize },
    Failed { error: String, abort: bool },
}

/// Per-job state passed to each window.
struct JobContext<'a> {
    name: &'a str,
    job: &'a JobConfig,
    queries: Vec<QueryDefinition>,
    identity: String,
    dir: PathBuf,
    force: bool,
    /// Progress is kept in the ledger
    durable: bool,
}

/// Fetch every window of `job`, recording progress in `ledger`.
///
/// Window failures are counted in the summary; only ledger and output
/// directory errors are returned as `Err`.
pub fn run_job<S>(
    name: &str,
    job: &JobConfig,
    source: &mut S,
    ledger: &mut Ledger,
    options: &RunOptions,
    progress: &ProgressContext,
) -> anyhow::Result<JobSummary>
where
    S: ReportSource + ?Sized,
{
    let start = Instant::now();
    let queries = job.queries(&options.view_id);
    let identity = short_hash(&query_identity(&queries)?);
    let ctx = JobContext {
        name,
        job,
        queries,
        identity,
        dir: job_dir(&options.output_dir, name),
        force: options.force,
        durable: job.has_durable_output(),
    };
    cleanup_tmp_files(&ctx.dir)
        .with_context(|| format!("{name}: failed to clean stale tmp files"))?;
    if !ctx.durable {
        log::info!("{name}: console output only, progress is not recorded");
    }

    let windows: Vec<DateWindow> = job.windows().collect();
    let mut summary = JobSummary::new(name, windows.len());
    log::info!(
        "{name}: {} window(s) from {} to {}, {} report(s), identity {}",
        windows.len(),
        job.start,
        job.end,
        ctx.queries.len(),
        ctx.identity
    );

    let bar = progress.windows_bar(name, windows.len());
    for window in &windows {
        if is_shutdown_requested() {
            log::warn!("{name}: shutdown requested, stopping before {window}");
            summary.interrupted = true;
            break;
        }

        match run_window(&ctx, window, source, ledger, progress)? {
            WindowOutcome::Skipped => {
                log::debug!("{name}: {window} already complete");
                summary.skipped += 1;
            }
            WindowOutcome::Completed {
                pages,
                rows,
                resumed,
            } => {
                log::info!(
                    "{name}: {window} complete, {} page(s), {} rows{}",
                    pages,
                    fmt_num(rows),
                    if resumed { " (resumed)" } else { "" }
                );
                summary.completed += 1;
                summary.resumed += usize::from(resumed);
                summary.pages += pages;
                summary.rows += rows;
            }
            WindowOutcome::Interrupted { pages, rows } => {
                log::warn!("{name}: {window} interrupted after {pages} page(s), resumable");
                summary.pages += pages;
                summary.rows += rows;
                summary.interrupted = true;
                break;
            }
            WindowOutcome::Failed { error, abort } => {
                log::error!("{name}: {window} failed: {error}");
                summary.failed += 1;
                summary.failures.push((window.label(), error));
                if abort {
                    log::error!("{name}: aborting remaining windows");
                    summary.aborted = true;
                    break;
                }
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    summary.elapsed = start.elapsed();
    Ok(summary)
}

fn run_window<S>(
    ctx: &JobContext<'_>,
    window: &DateWindow,
    source: &mut S,
    ledger: &mut Ledger,
    progress: &ProgressContext,
) -> anyhow::Result<WindowOutcome>
where
    S: ReportSource + ?Sized,
{
    let key = WindowKey::new(ctx.name, ctx.identity.as_str(), *window);
    let previous = if ctx.force || !ctx.durable {
        None
    } else {
        ledger.get(&key).cloned()
    };
    if previous.as_ref().is_some_and(WindowProgress::is_complete) {
        return Ok(WindowOutcome::Skipped);
    }

    let resumable = previous.and_then(|entry| {
        if entry.cursors.len() != ctx.queries.len() {
            log::warn!("{key}: ledger cursors don't match the batch, starting over");
            return None;
        }
        match resume_sinks(ctx, window, &entry) {
            Ok(sinks) => Some((sinks, entry)),
            Err(e) => {
                log::warn!("{key}: cannot roll back outputs ({e}), starting over");
                None
            }
        }
    });

    let (mut sinks, mut entry, resumed) = match resumable {
        Some((sinks, mut entry)) => {
            log::info!(
                "{key}: resuming after {} page(s) ({})",
                entry.pages,
                entry.status
            );
            entry.status = WindowStatus::InProgress;
            entry.error = None;
            (sinks, entry, true)
        }
        None => match fresh_sinks(ctx, window) {
            Ok((sinks, checkpoints)) => (
                sinks,
                WindowProgress::started(Cursor::initial(ctx.queries.len()), checkpoints),
                false,
            ),
            Err(e) => {
                let mut entry = WindowProgress::started(
                    Cursor::initial(ctx.queries.len()),
                    Default::default(),
                );
                entry.fail(&e);
                record(ctx, ledger, &key, entry)?;
                return Ok(WindowOutcome::Failed {
                    error: e.to_string(),
                    abort: ctx.job.fail_fast,
                });
            }
        },
    };
    record(ctx, ledger, &key, entry.clone())?;

    let spinner = progress.window_spinner(&format!("{} {}", ctx.name, window.label()));
    let mut ledger_error = None;
    let result = fetch_window(
        source,
        &ctx.queries,
        window,
        entry.cursors.clone(),
        |page| {
            sinks.write(page.response)?;
            entry.commit_page(page.cursors, page.response.row_count(), sinks.checkpoints()?);
            log::debug!(
                "{key}: page {} committed, {} rows, cursors {:?}",
                entry.pages,
                page.response.row_count(),
                page.cursors
            );
            spinner.set_message(format!(
                "page {} · {} rows",
                entry.pages,
                fmt_num(entry.rows as usize)
            ));
            if let Err(e) = record(ctx, ledger, &key, entry.clone()) {
                ledger_error = Some(e);
                return Ok(Flow::Stop);
            }
            if is_shutdown_requested() {
                return Ok(Flow::Stop);
            }
            Ok(Flow::Continue)
        },
    );
    spinner.finish_and_clear();
    if let Some(e) = ledger_error {
        return Err(e.context(format!("{key}: failed to record progress")));
    }

    match result {
        Ok(outcome) if outcome.completed => {
            if let Err(e) = post_process(ctx, window) {
                let error = format!("xlsx: {e:#}");
                entry.fail(&error);
                record(ctx, ledger, &key, entry)?;
                return Ok(WindowOutcome::Failed {
                    error,
                    abort: ctx.job.fail_fast,
                });
            }
            entry.complete();
            record(ctx, ledger, &key, entry)?;
            Ok(WindowOutcome::Completed {
                pages: outcome.pages,
                rows: outcome.rows,
                resumed,
            })
        }
        Ok(outcome) => Ok(WindowOutcome::Interrupted {
            pages: outcome.pages,
            rows: outcome.rows,
        }),
        Err(e) => {
            let abort = ctx.job.fail_fast
                || matches!(&e, FetchError::Source(source) if source.is_auth());
            entry.fail(&e);
            record(ctx, ledger, &key, entry)?;
            Ok(WindowOutcome::Failed {
                error: e.to_string(),
                abort,
            })
        }
    }
}

/// Store `entry` unless the job keeps no durable output.
fn record(
    ctx: &JobContext<'_>,
    ledger: &mut Ledger,
    key: &WindowKey,
    entry: WindowProgress,
) -> anyhow::Result<()> {
    if ctx.durable {
        ledger.put(key, entry)?;
    }
    Ok(())
}

/// Sinks of one window.
fn build_sinks(ctx: &JobContext<'_>, window: &DateWindow) -> SinkSet {
    let mut sinks = SinkSet::new();
    for config in ctx.job.sinks() {
        match &config {
            SinkConfig::Csv {
                suffix,
                shape,
                delimiter,
                ..
            } => {
                let path = ctx.job.csv_path(&ctx.dir, suffix, window);
                let mut sink = CsvSink::new(config.name(), path).delimiter(ascii_byte(*delimiter));
                if let Some(shape) = shape {
                    sink = sink.with_shape(shape.clone());
                }
                sinks.push(sink);
            }
            SinkConfig::Console => sinks.push(TableSink::stdout(config.name())),
        }
    }
    if ctx.job.json {
        sinks.push(JsonSink::new(JSON_SINK, ctx.job.json_path(&ctx.dir, window)));
    }
    sinks
}

fn resume_sinks(
    ctx: &JobContext<'_>,
    window: &DateWindow,
    entry: &WindowProgress,
) -> Result<SinkSet, SinkError> {
    let mut sinks = build_sinks(ctx, window);
    sinks.restore(&entry.checkpoints)?;
    Ok(sinks)
}

/// Remove any output of the window, spreadsheets included, and return the
/// sinks with their (empty) checkpoints.
fn fresh_sinks(
    ctx: &JobContext<'_>,
    window: &DateWindow,
) -> Result<(SinkSet, BTreeMap<String, u64>), SinkError> {
    let mut sinks = build_sinks(ctx, window);
    sinks.reset()?;
    for config in ctx.job.sinks() {
        if let SinkConfig::Csv { suffix, .. } = &config {
            let xlsx = xlsx_path(&ctx.job.csv_path(&ctx.dir, suffix, window));
            match std::fs::remove_file(&xlsx) {
                Ok(()) => log::debug!("{}: removed stale spreadsheet", xlsx.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SinkError::io(&xlsx, e)),
            }
        }
    }
    let checkpoints = sinks.checkpoints()?;
    Ok((sinks, checkpoints))
}

/// Delimiters are checked to be ASCII when the job is validated.
fn ascii_byte(delimiter: char) -> u8 {
    u8::try_from(delimiter).unwrap_or(b',')
}

/// Convert every opted-in CSV of a completed window to `.xlsx`.
fn post_process(ctx: &JobContext<'_>, window: &DateWindow) -> anyhow::Result<()> {
    let Some(xlsx) = &ctx.job.xlsx else {
        return Ok(());
    };
    let options = xlsx.options();
    for sink in ctx.job.sinks() {
        let SinkConfig::Csv {
            suffix,
            delimiter,
            xlsx: true,
            ..
        } = &sink
        else {
            continue;
        };
        let path = ctx.job.csv_path(&ctx.dir, suffix, window);
        if !path.exists() {
            log::debug!("{}: no rows, no spreadsheet", path.display());
            continue;
        }
        if *delimiter != ',' {
            log::warn!(
                "{}: xlsx conversion needs a comma delimiter, skipped",
                path.display()
            );
            continue;
        }
        let summary = csv_to_xlsx(&path, &options)?;
        if !summary.sorted {
            log::debug!("{}: left in fetch order", summary.path.display());
        }
    }
    Ok(())
}

/// Directory a job writes to.
pub fn job_dir(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(name)
}
