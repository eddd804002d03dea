//! In-memory CSV table shared by the export steps

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Header plus rows, every row padded or cut to the header width.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a comma-delimited file with a header line.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let header: Vec<String> = reader
            .headers()
            .with_context(|| format!("failed to read header of {}", path.display()))?
            .iter()
            .map(String::from)
            .collect();

        let width = header.len();
        let mut ragged = 0usize;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("failed to read {}", path.display()))?;
            if record.len() != width {
                ragged += 1;
            }
            let mut row: Vec<String> = record.iter().take(width).map(String::from).collect();
            row.resize(width, String::new());
            rows.push(row);
        }
        if ragged > 0 {
            log::warn!(
                "{}: {ragged} rows did not match the {width}-column header",
                path.display()
            );
        }
        Ok(Self { header, rows })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Write as comma-delimited CSV through a tmp file + rename.
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, |tmp| {
            let mut writer = csv::Writer::from_path(tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            writer.write_record(&self.header)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

/// Produce `path` by writing `path.tmp` and renaming it into place.
pub(crate) fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = tmp_path(path);
    if let Err(e) = write(&tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to rename {} into place", tmp.display()))?;
    Ok(())
}

/// Serialize JSON to `path` atomically.
pub(crate) fn write_json_atomic(path: &Path, value: &serde_json::Value) -> Result<()> {
    write_atomic(path, |tmp| {
        let file =
            File::create(tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        writer.flush()?;
        Ok(())
    })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
