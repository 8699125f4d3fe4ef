// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Per-source problems (`SourceParse`) are recovered by the orchestrator.
//! Store-level problems (`LogCorruption`, `AggregateCorruption`, `Io`) abort
//! the run before anything else is written.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A raw event file could not be read or is not a usable JSON object.
    #[error("source {path} skipped: {reason}")]
    SourceParse { path: PathBuf, reason: String },

    /// The existing event log has a line that cannot be decoded.
    #[error("event log {path} is unreadable at line {line}: {reason}")]
    LogCorruption {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// The existing aggregate table cannot be decoded.
    #[error("aggregate store {path} is unreadable: {reason}")]
    AggregateCorruption { path: PathBuf, reason: String },

    /// I/O failure on a durable artifact.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that only affect one source file.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SourceParse { .. })
    }
}
