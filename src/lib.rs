// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::error::{PipelineError, Result};
pub use crate::ingest::run_once;
pub use crate::ingest::types::{NormalizedEvent, RunOutcome, RunSummary};
