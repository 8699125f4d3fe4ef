// src/config/pipeline.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "MYO_PIPELINE_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/pipeline.toml";
pub const DEFAULT_JSON_PATH: &str = "config/pipeline.json";

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw/events")
}
fn default_event_log() -> PathBuf {
    PathBuf::from("data/processed/events.jsonl")
}
fn default_aggregates() -> PathBuf {
    PathBuf::from("outputs/exercise_recommendations/exercise_stats.csv")
}
fn default_recommendations() -> PathBuf {
    PathBuf::from("outputs/exercise_recommendations/top_exercises_overall.csv")
}
fn default_interval_secs() -> u64 {
    300
}

/// Where the pipeline reads and writes. Relative paths are resolved against
/// the working directory unless `rebase` is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    /// Defaults to `<raw_dir>/processed`.
    #[serde(default)]
    pub processed_dir: Option<PathBuf>,
    #[serde(default = "default_event_log")]
    pub event_log: PathBuf,
    #[serde(default = "default_aggregates")]
    pub aggregates: PathBuf,
    #[serde(default = "default_recommendations")]
    pub recommendations: PathBuf,
    /// Skip sources whose content digest was already committed.
    #[serde(default)]
    pub dedup_by_digest: bool,
    /// Defaults to `<processed_dir>/.ingested_digests`.
    #[serde(default)]
    pub digest_ledger: Option<PathBuf>,
    /// Prometheus textfile written after each run.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: None,
            event_log: default_event_log(),
            aggregates: default_aggregates(),
            recommendations: default_recommendations(),
            dedup_by_digest: false,
            digest_ledger: None,
            metrics_textfile: None,
            interval_secs: default_interval_secs(),
        }
    }
}

impl PipelineConfig {
    /// Default layout under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        Self::default().rebase(root)
    }

    /// Resolve every relative path against `root`. Absolute paths are kept.
    pub fn rebase(self, root: &Path) -> Self {
        Self {
            raw_dir: root.join(self.raw_dir),
            processed_dir: self.processed_dir.map(|p| root.join(p)),
            event_log: root.join(self.event_log),
            aggregates: root.join(self.aggregates),
            recommendations: root.join(self.recommendations),
            digest_ledger: self.digest_ledger.map(|p| root.join(p)),
            metrics_textfile: self.metrics_textfile.map(|p| root.join(p)),
            ..self
        }
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.processed_dir
            .clone()
            .unwrap_or_else(|| self.raw_dir.join("processed"))
    }

    pub fn digest_ledger(&self) -> PathBuf {
        self.digest_ledger
            .clone()
            .unwrap_or_else(|| self.processed_dir().join(".ingested_digests"))
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing pipeline config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $MYO_PIPELINE_CONFIG
/// 2) config/pipeline.toml
/// 3) config/pipeline.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<PipelineConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(PipelineConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        _ => {
            // No usable extension: JSON documents start with `{`.
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}
