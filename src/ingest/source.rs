// src/ingest/source.rs
//! Raw source directory: discovery and the "consumed" relocation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::types::SourceFile;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct SourceDirectory {
    raw_dir: PathBuf,
    processed_dir: PathBuf,
}

impl SourceDirectory {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
        }
    }

    pub fn raw_dir(&self) -> &Path {
        &self.raw_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// `*.json` regular files directly under the raw directory, sorted by
    /// file name. A missing directory has no sources.
    pub fn discover(&self) -> Result<Vec<SourceFile>> {
        let entries = match fs::read_dir(&self.raw_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PipelineError::io(&self.raw_dir, e)),
        };

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::io(&self.raw_dir, e))?;
            let path = entry.path();
            if !path.is_file() || !is_json(&path) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            found.push(SourceFile { path, file_name });
        }
        found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(found)
    }

    /// Move a committed source into the processed directory, replacing any
    /// file of the same name already there.
    pub fn mark_consumed(&self, source: &SourceFile) -> Result<PathBuf> {
        fs::create_dir_all(&self.processed_dir)
            .map_err(|e| PipelineError::io(&self.processed_dir, e))?;
        let target = self.processed_dir.join(&source.file_name);
        fs::rename(&source.path, &target).map_err(|e| PipelineError::io(&source.path, e))?;
        Ok(target)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
