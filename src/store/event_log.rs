// src/store/event_log.rs
//! Append-only event log stored as JSON Lines.
//!
//! One `NormalizedEvent` per line, in arrival order. Existing lines are
//! never rewritten: an append copies the current bytes verbatim, adds the
//! new rows and atomically swaps the file in.

use std::io::Write;
use std::path::{Path, PathBuf};

use super::{read_optional, replace_file};
use crate::error::{PipelineError, Result};
use crate::ingest::types::NormalizedEvent;

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full ordered history. A missing log is empty; any undecodable line is
    /// `LogCorruption`.
    pub fn read_all(&self) -> Result<Vec<NormalizedEvent>> {
        match read_optional(&self.path)? {
            Some(bytes) => self.decode(&bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Append `batch` after all existing rows. Returns the total row count.
    pub fn append(&self, batch: &[NormalizedEvent]) -> Result<usize> {
        let prior = read_optional(&self.path)?.unwrap_or_default();
        let existing = self.decode(&prior)?.len();
        if batch.is_empty() {
            return Ok(existing);
        }

        replace_file(&self.path, |w| {
            w.write_all(&prior)?;
            if !prior.is_empty() && !prior.ends_with(b"\n") {
                w.write_all(b"\n")?;
            }
            for ev in batch {
                serde_json::to_writer(&mut *w, ev)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;

        tracing::debug!(
            target: "event_log",
            path = %self.path.display(),
            appended = batch.len(),
            total = existing + batch.len(),
            "event log appended"
        );
        Ok(existing + batch.len())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<NormalizedEvent>> {
        let mut rows = Vec::new();
        for (idx, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = std::str::from_utf8(raw).map_err(|e| self.corrupt(idx + 1, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let ev: NormalizedEvent =
                serde_json::from_str(line).map_err(|e| self.corrupt(idx + 1, e))?;
            rows.push(ev);
        }
        Ok(rows)
    }

    fn corrupt(&self, line: usize, reason: impl ToString) -> PipelineError {
        PipelineError::LogCorruption {
            path: self.path.clone(),
            line,
            reason: reason.to_string(),
        }
    }
}
