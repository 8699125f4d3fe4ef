// tests/metrics_ingest.rs
#![cfg(feature = "strict-metrics")]
use myo_pipeline::metrics::Metrics;
use myo_pipeline::{run_once, PipelineConfig};
use std::fs;

#[test]
fn metrics_exposed_after_ingest() {
    // Install the global recorder for this test binary
    let metrics = Metrics::init().expect("recorder");

    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig::rooted_at(dir.path());
    fs::create_dir_all(&cfg.raw_dir).unwrap();
    fs::write(cfg.raw_dir.join("ok.json"), r#"{"exercise_key":"squat"}"#).unwrap();
    fs::write(cfg.raw_dir.join("bad.json"), "nope").unwrap();
    run_once(&cfg).unwrap();

    // Scrape metrics text and check series presence by substring
    let out = metrics.render();
    assert!(out.contains("pipeline_sources_discovered_total"));
    assert!(out.contains("pipeline_sources_skipped_total"));
    assert!(out.contains("pipeline_rows_appended_total"));
    assert!(out.contains("pipeline_event_log_rows"));

    let textfile = dir.path().join("metrics/myo.prom");
    metrics.write_textfile(&textfile).unwrap();
    assert!(fs::read_to_string(&textfile)
        .unwrap()
        .contains("pipeline_rows_appended_total"));
}
