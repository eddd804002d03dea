//! Output sinks: append-only CSV, append-only JSON page log, console table
//!
//! Every sink exposes a checkpoint (`committed`) and can be rolled back to a
//! previous checkpoint, so a window interrupted mid-fetch resumes without
//! duplicating or losing rows.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};

use crate::error::SinkError;
use crate::page::{Page, Response};

/// Destination for fetched pages.
pub trait PageSink {
    /// Stable name; keys this sink's checkpoint in the progress ledger.
    fn name(&self) -> &str;

    /// Persist one response. Called once per page, in fetch order.
    fn write(&mut self, response: &Response) -> Result<(), SinkError>;

    /// Current checkpoint: bytes committed to the output.
    fn committed(&self) -> Result<u64, SinkError>;

    /// Discard everything written after `checkpoint`. Zero removes the output.
    fn rollback(&mut self, checkpoint: u64) -> Result<(), SinkError>;
}

/// Row-oriented delimited file, opened in append mode for each page.
///
/// The header (dimensions then metrics) is written only when the file is
/// empty. With a declared shape, only reports whose dimension list is
/// exactly equal to it are written.
#[derive(Debug)]
pub struct CsvSink {
    name: String,
    path: PathBuf,
    delimiter: u8,
    shape: Option<Vec<String>>,
}

impl CsvSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            delimiter: b',',
            shape: None,
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_shape(mut self, dimensions: Vec<String>) -> Self {
        self.shape = Some(dimensions);
        self
    }

    fn accepts(&self, page: &Page) -> bool {
        self.shape.as_deref().map_or(true, |shape| page.has_shape(shape))
    }
}

impl PageSink for CsvSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, response: &Response) -> Result<(), SinkError> {
        let pages: Vec<&Page> = response
            .reports
            .iter()
            .filter(|p| self.accepts(p))
            .collect();
        if pages.is_empty() {
            return Ok(());
        }

        ensure_parent_dir(&self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::io(&self.path, e))?;
        let mut needs_header = file
            .metadata()
            .map_err(|e| SinkError::io(&self.path, e))?
            .len()
            == 0;

        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .flexible(true)
            .from_writer(file);

        for page in pages {
            if needs_header {
                writer
                    .write_record(page.header())
                    .map_err(|e| SinkError::csv(&self.path, e))?;
                needs_header = false;
            }
            for record in page.records() {
                writer
                    .write_record(&record)
                    .map_err(|e| SinkError::csv(&self.path, e))?;
            }
        }
        writer.flush().map_err(|e| SinkError::io(&self.path, e))
    }

    fn committed(&self) -> Result<u64, SinkError> {
        file_len(&self.path)
    }

    fn rollback(&mut self, checkpoint: u64) -> Result<(), SinkError> {
        truncate_to(&self.path, checkpoint)
    }
}

/// Structured page log: one compact JSON document per line (NDJSON), each
/// holding the raw response of one page.
///
/// Pages are appended, so each write costs only its own bytes. The
/// checkpoint is the file length; a line torn by an interruption lies past
/// the last checkpoint and is truncated on resume.
#[derive(Debug)]
pub struct JsonSink {
    name: String,
    path: PathBuf,
}

impl JsonSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl PageSink for JsonSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, response: &Response) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(response).map_err(|e| SinkError::json(&self.path, e))?;
        line.push(b'\n');

        ensure_parent_dir(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::io(&self.path, e))?;
        file.write_all(&line)
            .map_err(|e| SinkError::io(&self.path, e))
    }

    fn committed(&self) -> Result<u64, SinkError> {
        file_len(&self.path)
    }

    fn rollback(&mut self, checkpoint: u64) -> Result<(), SinkError> {
        truncate_to(&self.path, checkpoint)
    }
}

/// Read back every page stored by a [`JsonSink`], in write order.
pub fn read_pages(path: &Path) -> Result<Vec<Response>, SinkError> {
    let file = File::open(path).map_err(|e| SinkError::io(path, e))?;
    let mut pages = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| SinkError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        pages.push(serde_json::from_str(&line).map_err(|e| SinkError::json(path, e))?);
    }
    Ok(pages)
}

/// Tab-separated console table: header plus rows for every report.
pub struct TableSink<W: Write> {
    name: String,
    out: W,
}

impl TableSink<io::Stdout> {
    pub fn stdout(name: impl Into<String>) -> Self {
        Self::new(name, io::stdout())
    }
}

impl<W: Write> TableSink<W> {
    pub fn new(name: impl Into<String>, out: W) -> Self {
        Self {
            name: name.into(),
            out,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PageSink for TableSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn write(&mut self, response: &Response) -> Result<(), SinkError> {
        let path = Path::new("<stdout>");
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .flexible(true)
            .from_writer(&mut self.out);
        for page in &response.reports {
            writer
                .write_record(page.header())
                .map_err(|e| SinkError::csv(path, e))?;
            for record in page.records() {
                writer
                    .write_record(&record)
                    .map_err(|e| SinkError::csv(path, e))?;
            }
        }
        writer.flush().map_err(|e| SinkError::io(path, e))
    }

    fn committed(&self) -> Result<u64, SinkError> {
        Ok(0)
    }

    fn rollback(&mut self, _checkpoint: u64) -> Result<(), SinkError> {
        Ok(())
    }
}

/// All sinks of one window; each page is written to every sink in order.
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<Box<dyn PageSink>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl PageSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn write(&mut self, response: &Response) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.write(response)?;
        }
        Ok(())
    }

    /// Checkpoint of every sink, keyed by sink name.
    pub fn checkpoints(&self) -> Result<BTreeMap<String, u64>, SinkError> {
        self.sinks
            .iter()
            .map(|s| -> Result<(String, u64), SinkError> {
                Ok((s.name().to_string(), s.committed()?))
            })
            .collect()
    }

    /// Roll every sink back to its recorded checkpoint (missing = 0).
    pub fn restore(&mut self, checkpoints: &BTreeMap<String, u64>) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            let checkpoint = checkpoints.get(sink.name()).copied().unwrap_or(0);
            sink.rollback(checkpoint)?;
        }
        Ok(())
    }

    /// Remove all output of this window.
    pub fn reset(&mut self) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.rollback(0)?;
        }
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), SinkError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn file_len(path: &Path) -> Result<u64, SinkError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(SinkError::io(path, e)),
    }
}

/// Cut an append-only file back to `checkpoint` bytes; zero removes it.
fn truncate_to(path: &Path, checkpoint: u64) -> Result<(), SinkError> {
    if checkpoint == 0 {
        return remove_if_exists(path);
    }
    let len = file_len(path)?;
    if len < checkpoint {
        return Err(SinkError::io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file has {len} bytes, checkpoint expects {checkpoint}"),
            ),
        ));
    }
    if len > checkpoint {
        log::debug!(
            "{}: truncating {} uncommitted bytes",
            path.display(),
            len - checkpoint
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| SinkError::io(path, e))?;
        file.set_len(checkpoint).map_err(|e| SinkError::io(path, e))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), SinkError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SinkError::io(path, e)),
    }
}

/// Remove stale .tmp files left by an interrupted atomic write
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(output_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
