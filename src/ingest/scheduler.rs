// src/ingest/scheduler.rs
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::types::RunSummary;

/// Spawn a cron-style loop that runs the pipeline every `interval`.
///
/// Runs never overlap: each tick waits for the previous run (executed on the
/// blocking pool) to finish, and late ticks are skipped. A failed run is
/// logged and the loop keeps going. `after_run` sees every result, e.g. to
/// export metrics.
pub fn spawn_interval_scheduler<F>(
    cfg: PipelineConfig,
    interval: Duration,
    mut after_run: F,
) -> JoinHandle<()>
where
    F: FnMut(&Result<RunSummary, PipelineError>) + Send + 'static,
{
    let interval = interval.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;

            let run_cfg = cfg.clone();
            let result = match tokio::task::spawn_blocking(move || crate::ingest::run_once(&run_cfg)).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, "pipeline task panicked");
                    continue;
                }
            };

            match &result {
                Ok(summary) => tracing::info!(target: "ingest", %summary, "scheduled run"),
                Err(e) => tracing::error!(target: "ingest", error = %e, "scheduled run failed"),
            }
            after_run(&result);
        }
    })
}
