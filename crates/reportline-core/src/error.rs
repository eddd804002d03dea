//! Error types for the fetch-and-persist pipeline

use std::path::{Path, PathBuf};

use crate::source::SourceError;

/// Failure writing to an output destination.
#[derive(Debug)]
pub enum SinkError {
    Io { path: PathBuf, source: std::io::Error },
    Csv { path: PathBuf, source: csv::Error },
    Json { path: PathBuf, source: serde_json::Error },
}

impl SinkError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. } | Self::Csv { path, .. } | Self::Json { path, .. } => path,
        }
    }
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "IO: {}: {source}", path.display()),
            Self::Csv { path, source } => write!(f, "CSV: {}: {source}", path.display()),
            Self::Json { path, source } => write!(f, "JSON: {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

/// Error that aborts the fetch of one date window.
#[derive(Debug)]
pub enum FetchError {
    Source(SourceError),
    Sink(SinkError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source(e) => write!(f, "source: {e}"),
            Self::Sink(e) => write!(f, "sink: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(e) => Some(e),
            Self::Sink(e) => Some(e),
        }
    }
}

impl From<SourceError> for FetchError {
    fn from(e: SourceError) -> Self {
        Self::Source(e)
    }
}

impl From<SinkError> for FetchError {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}
