// src/ingest/mod.rs
pub mod ledger;
pub mod normalize;
pub mod scheduler;
pub mod source;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

use crate::analyze;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::ingest::ledger::DigestLedger;
use crate::ingest::source::SourceDirectory;
use crate::ingest::types::{
    NormalizedEvent, RunOutcome, RunSummary, SkippedSource, SourceFile, StagedEvent,
};
use crate::store::aggregates::{self, AggregateStore};
use crate::store::event_log::EventLog;
use crate::store::recommendations::RecommendationStore;

/// One-time metrics registration (so series show up in the exposition).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "pipeline_sources_discovered_total",
            "Raw event files found by discovery."
        );
        describe_counter!(
            "pipeline_sources_skipped_total",
            "Raw event files rejected by the normalizer."
        );
        describe_counter!(
            "pipeline_rows_appended_total",
            "Normalized rows appended to the event log."
        );
        describe_counter!(
            "pipeline_duplicates_total",
            "Sources skipped because their digest was already committed."
        );
        describe_counter!(
            "pipeline_consume_failures_total",
            "Committed sources that could not be moved to the processed area."
        );
        describe_gauge!("pipeline_event_log_rows", "Rows in the event log.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last ran."
        );
    });
}

/// Result of the normalize step.
#[derive(Debug, Default)]
struct Staging {
    staged: Vec<StagedEvent>,
    skipped: Vec<SkippedSource>,
    duplicates: Vec<SourceFile>,
}

/// Read and normalize every source. Per-source failures are recorded and
/// never abort the batch.
fn stage_sources(sources: Vec<SourceFile>, known: Option<&HashSet<String>>) -> Staging {
    let mut out = Staging::default();
    let mut batch_digests: HashSet<String> = HashSet::new();

    for src in sources {
        let bytes = match std::fs::read(&src.path) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "ingest", file = %src.file_name, error = %e, "failed reading source");
                out.skipped.push(SkippedSource {
                    file_name: src.file_name,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let digest = ledger::digest(&bytes);
        if let Some(known) = known {
            if known.contains(&digest) || batch_digests.contains(&digest) {
                tracing::info!(target: "ingest", file = %src.file_name, "source already ingested");
                out.duplicates.push(src);
                continue;
            }
        }

        match normalize::parse_source(&src.path, &bytes) {
            Ok(event) => {
                // Only committed bytes make later copies duplicates.
                batch_digests.insert(digest.clone());
                out.staged.push(StagedEvent {
                    source: src,
                    digest,
                    event,
                });
            }
            Err(e) => {
                tracing::warn!(target: "ingest", file = %src.file_name, error = %e, "failed parsing source");
                out.skipped.push(SkippedSource {
                    file_name: src.file_name,
                    reason: e.to_string(),
                });
            }
        }
    }
    out
}

/// Run the pipeline once:
/// discover → normalize → append log → recompute aggregates → score → rank
/// → mark consumed.
///
/// Store-level problems (corrupt log or aggregate table, I/O on artifacts)
/// abort the run. The existing log and aggregates are validated before any
/// write happens.
pub fn run_once(cfg: &PipelineConfig) -> Result<RunSummary> {
    ensure_metrics_described();
    gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    let sources = SourceDirectory::new(&cfg.raw_dir, cfg.processed_dir());
    let discovered = sources.discover()?;
    counter!("pipeline_sources_discovered_total").increment(discovered.len() as u64);
    if discovered.is_empty() {
        tracing::info!(target: "ingest", raw_dir = %cfg.raw_dir.display(), "No new events to ingest.");
        return Ok(RunSummary::no_new_events());
    }
    let discovered_n = discovered.len();

    // Integrity checks before anything is written.
    let log = EventLog::new(&cfg.event_log);
    let history = log.read_all()?;
    let store = AggregateStore::new(&cfg.aggregates);
    let existing = store.load()?;
    let ledger = cfg
        .dedup_by_digest
        .then(|| DigestLedger::new(cfg.digest_ledger()));
    let known = match &ledger {
        Some(l) => Some(l.load()?),
        None => None,
    };

    let Staging {
        staged,
        skipped,
        duplicates,
    } = stage_sources(discovered, known.as_ref());
    counter!("pipeline_sources_skipped_total").increment(skipped.len() as u64);
    counter!("pipeline_duplicates_total").increment(duplicates.len() as u64);

    let mut summary = RunSummary {
        outcome: RunOutcome::Completed,
        discovered: discovered_n,
        ingested: 0,
        skipped,
        duplicates: duplicates.len(),
        rows_appended: 0,
        log_rows: history.len(),
        recommendations_regenerated: false,
    };

    if !staged.is_empty() {
        let batch: Vec<NormalizedEvent> = staged.iter().map(|s| s.event.clone()).collect();
        summary.log_rows = log.append(&batch)?;
        summary.rows_appended = batch.len();
        summary.ingested = staged.len();
        counter!("pipeline_rows_appended_total").increment(batch.len() as u64);
        tracing::info!(
            target: "ingest",
            appended = batch.len(),
            path = %log.path().display(),
            "appended events to log"
        );

        // Aggregates are recomputed from the full history: prior rows are
        // unchanged by the append, so prior + batch is the log.
        let delta = aggregates::compute_delta(history.iter().chain(batch.iter()));
        let mut table = aggregates::merge(&existing, &delta);
        let (plan, ranked) = analyze::score_and_rank(&mut table);
        store.save(&table)?;
        RecommendationStore::new(&cfg.recommendations).save(&ranked)?;
        summary.recommendations_regenerated = true;
        tracing::info!(
            target: "ingest",
            exercises = table.len(),
            normalized = matches!(plan, analyze::ScoringPlan::Normalized { .. }),
            "updated aggregates and recommendations"
        );

        if let Some(l) = &ledger {
            l.record(staged.iter().map(|s| s.digest.as_str()))?;
        }
    }
    gauge!("pipeline_event_log_rows").set(summary.log_rows as f64);

    // Only committed sources move; rejected ones stay for the next run.
    for src in staged.iter().map(|s| &s.source).chain(duplicates.iter()) {
        if let Err(e) = sources.mark_consumed(src) {
            counter!("pipeline_consume_failures_total").increment(1);
            tracing::error!(target: "ingest", file = %src.file_name, error = %e, "failed to mark source consumed");
        }
    }

    tracing::info!(target: "ingest", %summary, "ingest run finished");
    Ok(summary)
}
