// tests/ingest_scheduler.rs
use myo_pipeline::ingest::scheduler::spawn_interval_scheduler;
use myo_pipeline::{PipelineConfig, RunOutcome};
use std::fs;
use std::time::Duration;

#[tokio::test]
async fn scheduler_runs_pipeline_and_reports_each_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = PipelineConfig::rooted_at(dir.path());
    fs::create_dir_all(&cfg.raw_dir).unwrap();
    fs::write(
        cfg.raw_dir.join("e1.json"),
        r#"{"payload": {"exercise_key": "squat", "duration_min": 10}}"#,
    )
    .unwrap();

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = spawn_interval_scheduler(cfg.clone(), Duration::from_secs(1), move |res| {
        let outcome = res.as_ref().map(|s| s.outcome).map_err(|e| e.to_string());
        let _ = tx.send(outcome);
    });

    // first tick fires immediately
    let first = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("first run")
        .expect("channel open");
    assert_eq!(first, Ok(RunOutcome::Completed));

    let second = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("second run")
        .expect("channel open");
    assert_eq!(second, Ok(RunOutcome::NoNewEvents));

    handle.abort();
    assert!(cfg.processed_dir().join("e1.json").exists());
}
