//! Progress ledger: `ledger/` in the output directory.
//!
//! One entry per `{job}/{identity}/{start}_to_{end}` recording the cursors to
//! resume from, committed page/row counts and each sink's checkpoint. Each
//! entry lives in its own record file, rewritten atomically (tmp + rename) on
//! every update of that window.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reportline_core::{Cursor, DateWindow, cleanup_tmp_files};
use serde::{Deserialize, Serialize};

pub const LEDGER_DIR: &str = "ledger";
const LEDGER_VERSION: u32 = 1;

/// Ledger key for one window of one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub job: String,
    /// Short query identity hash
    pub identity: String,
    pub window: DateWindow,
}

impl WindowKey {
    pub fn new(job: impl Into<String>, identity: impl Into<String>, window: DateWindow) -> Self {
        Self {
            job: job.into(),
            identity: identity.into(),
            window,
        }
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.job, self.identity, self.window.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    InProgress,
    Complete,
    Failed,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        })
    }
}

/// How far one window got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowProgress {
    pub status: WindowStatus,
    /// Cursor to resume from, one per report of the batch
    pub cursors: Vec<Cursor>,
    pub pages: u64,
    pub rows: u64,
    /// Sink name → committed length in bytes
    pub checkpoints: BTreeMap<String, u64>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WindowProgress {
    /// Fresh entry before the first page of a window.
    pub fn started(cursors: Vec<Cursor>, checkpoints: BTreeMap<String, u64>) -> Self {
        Self {
            status: WindowStatus::InProgress,
            cursors,
            pages: 0,
            rows: 0,
            checkpoints,
            updated_at: Utc::now(),
            error: None,
        }
    }

    /// Record a page whose rows are durably in every sink.
    pub fn commit_page(
        &mut self,
        cursors: &[Cursor],
        rows: usize,
        checkpoints: BTreeMap<String, u64>,
    ) {
        self.cursors = cursors.to_vec();
        self.pages += 1;
        self.rows += rows as u64;
        self.checkpoints = checkpoints;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self) {
        self.status = WindowStatus::Complete;
        self.error = None;
        self.updated_at = Utc::now();
    }

    /// Mark failed; cursors and checkpoints still point at the last commit.
    pub fn fail(&mut self, error: impl fmt::Display) {
        self.status = WindowStatus::Failed;
        self.error = Some(error.to_string());
        self.updated_at = Utc::now();
    }

    pub fn is_complete(&self) -> bool {
        self.status == WindowStatus::Complete
    }
}

/// On-disk form of one window's record.
#[derive(Serialize)]
struct RecordRef<'a> {
    version: u32,
    key: &'a str,
    progress: &'a WindowProgress,
}

#[derive(Deserialize)]
struct Record {
    version: u32,
    key: String,
    progress: WindowProgress,
}

/// Progress ledger bound to a directory: one record file per window under
/// `dir/ledger/{job}/`, so an update rewrites only that window's record.
#[derive(Debug)]
pub struct Ledger {
    root: PathBuf,
    windows: BTreeMap<String, WindowProgress>,
}

impl Ledger {
    /// Load every record under `dir/ledger`, or start empty if there is none.
    pub fn open(dir: &Path) -> Result<Self> {
        let root = dir.join(LEDGER_DIR);
        let mut windows = BTreeMap::new();
        if root.is_dir() {
            for job_dir in read_dir_sorted(&root)? {
                if !job_dir.is_dir() {
                    continue;
                }
                cleanup_tmp_files(&job_dir)
                    .with_context(|| format!("failed to clean {}", job_dir.display()))?;
                for path in read_dir_sorted(&job_dir)? {
                    if path.extension().is_some_and(|ext| ext == "json") {
                        let record = read_record(&path)?;
                        windows.insert(record.key, record.progress);
                    }
                }
            }
        }
        log::debug!("ledger {}: {} windows", root.display(), windows.len());
        Ok(Self { root, windows })
    }

    /// Directory holding the record files.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Record file of `key`.
    pub fn record_path(&self, key: &WindowKey) -> PathBuf {
        self.root
            .join(&key.job)
            .join(format!("{}_{}.json", key.identity, key.window.label()))
    }

    pub fn get(&self, key: &WindowKey) -> Option<&WindowProgress> {
        self.windows.get(&key.to_string())
    }

    /// Store `progress` under `key` and persist that window's record.
    pub fn put(&mut self, key: &WindowKey, progress: WindowProgress) -> Result<()> {
        let name = key.to_string();
        let path = self.record_path(key);
        write_record(
            &path,
            &RecordRef {
                version: LEDGER_VERSION,
                key: &name,
                progress: &progress,
            },
        )?;
        self.windows.insert(name, progress);
        Ok(())
    }

    /// Drop every entry of `job`. Returns how many were removed.
    pub fn clear_job(&mut self, job: &str) -> Result<usize> {
        let prefix = format!("{job}/");
        let before = self.windows.len();
        self.windows.retain(|k, _| !k.starts_with(&prefix));
        let job_dir = self.root.join(job);
        if job_dir.is_dir() {
            std::fs::remove_dir_all(&job_dir)
                .with_context(|| format!("failed to remove {}", job_dir.display()))?;
        }
        Ok(before - self.windows.len())
    }

    /// All entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &WindowProgress)> {
        self.windows.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read {}", dir.display()))?;
    paths.sort();
    Ok(paths)
}

fn read_record(path: &Path) -> Result<Record> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record: Record = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if record.version != LEDGER_VERSION {
        bail!(
            "{}: unsupported ledger version {} (expected {LEDGER_VERSION})",
            path.display(),
            record.version
        );
    }
    Ok(record)
}

/// Write one record atomically (tmp + rename).
fn write_record(path: &Path, record: &RecordRef<'_>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(record).context("failed to serialize ledger record")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to rename {}", tmp.display()))?;
    Ok(())
}
