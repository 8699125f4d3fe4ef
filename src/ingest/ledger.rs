// src/ingest/ledger.rs
//! Optional idempotency key for raw sources.
//!
//! Each committed source is remembered by the SHA-256 of its bytes, one hex
//! digest per line. A source whose digest is already recorded is treated as
//! committed and only relocated, never re-appended.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::store::read_optional;

pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct DigestLedger {
    path: PathBuf,
}

impl DigestLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<HashSet<String>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(HashSet::new());
        };
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn record<'a, I>(&self, digests: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let write = || -> std::io::Result<()> {
            let mut f = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            for d in digests {
                writeln!(f, "{d}")?;
            }
            f.sync_all()
        };
        write().map_err(|e| PipelineError::io(&self.path, e))
    }
}
