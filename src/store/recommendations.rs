// src/store/recommendations.rs
//! Ranked output consumed by the dashboard (`exercise_key,score`).

use std::path::{Path, PathBuf};

use super::{read_optional, replace_file};
use crate::analyze::rank::RecommendationEntry;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct RecommendationStore {
    path: PathBuf,
}

impl RecommendationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the previous ranking entirely.
    pub fn save(&self, entries: &[RecommendationEntry]) -> Result<()> {
        replace_file(&self.path, |w| {
            // header written explicitly so an empty ranking still has one
            let mut out = csv::WriterBuilder::new().has_headers(false).from_writer(w);
            out.write_record(["exercise_key", "score"])?;
            for e in entries {
                out.serialize(e)?;
            }
            out.flush()
        })
    }

    pub fn load(&self) -> Result<Vec<RecommendationEntry>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        reader
            .deserialize()
            .collect::<std::result::Result<Vec<RecommendationEntry>, _>>()
            .map_err(|e| PipelineError::io(&self.path, e.into()))
    }
}
