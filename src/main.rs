//! myo-pipeline binary entrypoint
//! Runs the workout event ingestion pipeline once, or on an interval.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use myo_pipeline::config::{load_config_default, load_config_from, PipelineConfig};
use myo_pipeline::ingest::scheduler::spawn_interval_scheduler;
use myo_pipeline::metrics::Metrics;
use myo_pipeline::run_once;

#[derive(Debug, Parser)]
#[command(name = "myo-pipeline", version, about = "Workout event ingestion and exercise ranking")]
struct Cli {
    /// Config file (TOML or JSON). Defaults to $MYO_PIPELINE_CONFIG, then config/pipeline.{toml,json}.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths of the configuration against this directory.
    #[arg(long, global = true, env = "MYO_DATA_ROOT")]
    data_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest pending events once and exit (default).
    Run,
    /// Ingest on an interval until Ctrl-C.
    Watch {
        /// Overrides `interval_secs` from the configuration.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

/// Compact human logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("myo_pipeline=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let cfg = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config_default()?,
    };
    Ok(match &cli.data_root {
        Some(root) => cfg.rebase(root),
        None => cfg,
    })
}

fn export_metrics(metrics: &Option<Metrics>, cfg: &PipelineConfig) {
    if let (Some(m), Some(path)) = (metrics, &cfg.metrics_textfile) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!("metrics export: {e:#}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    tracing::info!(
        raw_dir = %cfg.raw_dir.display(),
        event_log = %cfg.event_log.display(),
        dedup_by_digest = cfg.dedup_by_digest,
        "myo-pipeline v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let metrics = match cfg.metrics_textfile {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let run_cfg = cfg.clone();
            let summary = tokio::task::spawn_blocking(move || run_once(&run_cfg))
                .await
                .context("pipeline task")??;
            export_metrics(&metrics, &cfg);
            println!("{summary}");
        }
        Command::Watch { interval_secs } => {
            let interval = Duration::from_secs(interval_secs.unwrap_or(cfg.interval_secs));
            let export_cfg = cfg.clone();
            let handle = spawn_interval_scheduler(cfg, interval, move |_| {
                export_metrics(&metrics, &export_cfg)
            });
            tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
            tracing::info!("shutting down scheduler");
            handle.abort();
        }
    }
    Ok(())
}
