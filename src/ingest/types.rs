// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Canonical workout event row. Every field is optional; absent source
/// values stay `None` and are written as `null` in the event log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedEvent {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: Option<String>,
    pub exercise_id: Option<String>,
    pub exercise_key: Option<String>,
    pub sets: Option<u32>,
    pub reps: Option<u32>,
    pub weight_kg: Option<f64>,
    pub rpe: Option<f64>,
    pub duration_min: Option<f64>,
    pub completed: Option<bool>,
}

impl NormalizedEvent {
    /// Rows without an exercise key are logged for audit but never aggregated.
    pub fn aggregation_key(&self) -> Option<&str> {
        self.exercise_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// One discovered raw event file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// A source that normalized cleanly and waits for its log append.
#[derive(Debug, Clone)]
pub struct StagedEvent {
    pub source: SourceFile,
    pub digest: String,
    pub event: NormalizedEvent,
}

/// A source that was rejected during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub file_name: String,
    pub reason: String,
}

/// Terminal state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Discovery found no candidate files; nothing was touched.
    NoNewEvents,
    /// Sources were processed (possibly all skipped).
    Completed,
}

/// What a run did, for logs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub discovered: usize,
    pub ingested: usize,
    pub skipped: Vec<SkippedSource>,
    pub duplicates: usize,
    pub rows_appended: usize,
    pub log_rows: usize,
    pub recommendations_regenerated: bool,
}

impl RunSummary {
    pub fn no_new_events() -> Self {
        Self {
            outcome: RunOutcome::NoNewEvents,
            discovered: 0,
            ingested: 0,
            skipped: Vec::new(),
            duplicates: 0,
            rows_appended: 0,
            log_rows: 0,
            recommendations_regenerated: false,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            RunOutcome::NoNewEvents => write!(f, "No new events to ingest."),
            RunOutcome::Completed => write!(
                f,
                "discovered={} ingested={} skipped={} duplicates={} appended={} log_rows={} recommendations_regenerated={}",
                self.discovered,
                self.ingested,
                self.skipped.len(),
                self.duplicates,
                self.rows_appended,
                self.log_rows,
                self.recommendations_regenerated
            ),
        }
    }
}
