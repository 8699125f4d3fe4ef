// src/store/aggregates.rs
//! Per-exercise aggregate table.
//!
//! The table lives in a CSV keyed by `exercise_key`. Besides the canonical
//! columns it may carry columns written by upstream offline jobs; those are
//! kept verbatim so a merge never drops data this pipeline does not own.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use super::{read_optional, replace_file};
use crate::error::{PipelineError, Result};
use crate::ingest::types::NormalizedEvent;

pub const KEY_COLUMN: &str = "exercise_key";
pub const CANONICAL_COLUMNS: [&str; 6] = [
    KEY_COLUMN,
    "count",
    "avg_calories",
    "avg_duration",
    "median_intensity",
    "score",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExerciseAggregate {
    pub exercise_key: String,
    pub count: Option<u64>,
    pub avg_calories: Option<f64>,
    pub avg_duration: Option<f64>,
    pub median_intensity: Option<f64>,
    pub score: Option<f64>,
    /// Non-canonical columns, by header name.
    pub extra: BTreeMap<String, String>,
}

impl ExerciseAggregate {
    pub fn new(exercise_key: impl Into<String>) -> Self {
        Self {
            exercise_key: exercise_key.into(),
            ..Default::default()
        }
    }
}

/// All aggregate rows plus the order of any extra columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateTable {
    pub extra_columns: Vec<String>,
    pub rows: Vec<ExerciseAggregate>,
}

impl AggregateTable {
    pub fn get(&self, key: &str) -> Option<&ExerciseAggregate> {
        self.rows.iter().find(|r| r.exercise_key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fields recomputed from a batch of events for one exercise key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateDelta {
    pub count: u64,
    /// Mean `duration_min`, standing in for calories. `None` when no
    /// contributing row carried a duration, in which case the merge keeps
    /// the stored value.
    pub avg_calories: Option<f64>,
}

/// Group events by exercise key. Rows without a key are ignored.
pub fn compute_delta<'a, I>(events: I) -> BTreeMap<String, AggregateDelta>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    #[derive(Default)]
    struct Acc {
        count: u64,
        duration_sum: f64,
        duration_n: u64,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for ev in events {
        let Some(key) = ev.aggregation_key() else {
            continue;
        };
        let acc = groups.entry(key.to_string()).or_default();
        acc.count += 1;
        if let Some(d) = ev.duration_min {
            acc.duration_sum += d;
            acc.duration_n += 1;
        }
    }

    groups
        .into_iter()
        .map(|(key, acc)| {
            let avg_calories =
                (acc.duration_n > 0).then(|| acc.duration_sum / acc.duration_n as f64);
            (
                key,
                AggregateDelta {
                    count: acc.count,
                    avg_calories,
                },
            )
        })
        .collect()
}

/// Field-level merge. Delta fields override the stored ones; everything the
/// delta does not recompute is carried over. Existing rows keep their
/// position, new keys are appended in key order.
pub fn merge(existing: &AggregateTable, delta: &BTreeMap<String, AggregateDelta>) -> AggregateTable {
    let mut merged = existing.clone();
    let mut seen: HashSet<String> = HashSet::with_capacity(merged.rows.len());

    for row in merged.rows.iter_mut() {
        seen.insert(row.exercise_key.clone());
        if let Some(d) = delta.get(&row.exercise_key) {
            apply_delta(row, d);
        }
    }

    for (key, d) in delta {
        if seen.contains(key) {
            continue;
        }
        let mut row = ExerciseAggregate::new(key.clone());
        apply_delta(&mut row, d);
        merged.rows.push(row);
    }

    merged
}

fn apply_delta(row: &mut ExerciseAggregate, d: &AggregateDelta) {
    row.count = Some(d.count);
    if let Some(cal) = d.avg_calories {
        row.avg_calories = Some(cal);
    }
}

/// CSV-backed aggregate table.
#[derive(Debug, Clone)]
pub struct AggregateStore {
    path: PathBuf,
}

impl AggregateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or zero-length file → empty table.
    pub fn load(&self) -> Result<AggregateTable> {
        let bytes = match read_optional(&self.path)? {
            Some(b) if !b.is_empty() => b,
            _ => return Ok(AggregateTable::default()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes.as_slice());
        let headers = reader.headers().map_err(|e| self.corrupt(e))?.clone();

        let key_idx = headers
            .iter()
            .position(|h| h == KEY_COLUMN)
            .ok_or_else(|| self.corrupt(format!("missing `{KEY_COLUMN}` column")))?;
        let find = |name: &str| headers.iter().position(|h| h == name);
        let (count_idx, cal_idx, dur_idx, int_idx, score_idx) = (
            find("count"),
            find("avg_calories"),
            find("avg_duration"),
            find("median_intensity"),
            find("score"),
        );
        let extra: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !CANONICAL_COLUMNS.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut table = AggregateTable {
            extra_columns: extra.iter().map(|(_, h)| h.clone()).collect(),
            rows: Vec::new(),
        };
        let mut keys = HashSet::new();

        for (n, record) in reader.records().enumerate() {
            let record = record.map_err(|e| self.corrupt(e))?;
            let row_no = n + 2;
            let key = record.get(key_idx).unwrap_or_default().trim();
            if key.is_empty() {
                return Err(self.corrupt(format!("row {row_no}: empty `{KEY_COLUMN}`")));
            }
            if !keys.insert(key.to_string()) {
                return Err(self.corrupt(format!("row {row_no}: duplicate key `{key}`")));
            }

            let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i));
            let real = |col: &str, idx: Option<usize>| {
                parse_real(cell(idx)).map_err(|e| self.corrupt(format!("row {row_no}, {col}: {e}")))
            };

            table.rows.push(ExerciseAggregate {
                exercise_key: key.to_string(),
                count: parse_count(cell(count_idx))
                    .map_err(|e| self.corrupt(format!("row {row_no}, count: {e}")))?,
                avg_calories: real("avg_calories", cal_idx)?,
                avg_duration: real("avg_duration", dur_idx)?,
                median_intensity: real("median_intensity", int_idx)?,
                score: real("score", score_idx)?,
                extra: extra
                    .iter()
                    .map(|(i, h)| (h.clone(), record.get(*i).unwrap_or_default().to_string()))
                    .collect(),
            });
        }

        Ok(table)
    }

    /// Atomically rewrite the table.
    pub fn save(&self, table: &AggregateTable) -> Result<()> {
        replace_file(&self.path, |w| {
            let mut out = csv::Writer::from_writer(w);
            let header = CANONICAL_COLUMNS
                .iter()
                .copied()
                .chain(table.extra_columns.iter().map(String::as_str));
            out.write_record(header)?;

            for row in &table.rows {
                let mut record = vec![
                    row.exercise_key.clone(),
                    row.count.map(|c| c.to_string()).unwrap_or_default(),
                    fmt_real(row.avg_calories),
                    fmt_real(row.avg_duration),
                    fmt_real(row.median_intensity),
                    fmt_real(row.score),
                ];
                record.extend(
                    table
                        .extra_columns
                        .iter()
                        .map(|c| row.extra.get(c).cloned().unwrap_or_default()),
                );
                out.write_record(&record)?;
            }
            out.flush()
        })
    }

    fn corrupt(&self, reason: impl ToString) -> PipelineError {
        PipelineError::AggregateCorruption {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

fn parse_real(cell: Option<&str>) -> std::result::Result<Option<f64>, String> {
    let Some(s) = cell.map(str::trim) else {
        return Ok(None);
    };
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("`{s}` is not a number"))
}

fn parse_count(cell: Option<&str>) -> std::result::Result<Option<u64>, String> {
    match parse_real(cell)? {
        None => Ok(None),
        Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
        Some(f) => Err(format!("`{f}` is not a non-negative integer")),
    }
}

fn fmt_real(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn ev(key: Option<&str>, duration: Option<f64>) -> NormalizedEvent {
        NormalizedEvent {
            exercise_key: key.map(str::to_string),
            duration_min: duration,
            ..Default::default()
        }
    }

    #[test]
    fn delta_groups_by_key_and_ignores_keyless_rows() {
        let events = vec![
            ev(Some("squat"), Some(10.0)),
            ev(Some("squat"), Some(20.0)),
            ev(Some("squat"), None),
            ev(None, Some(99.0)),
            ev(Some("plank"), None),
        ];
        let delta = compute_delta(&events);
        assert_eq!(delta.len(), 2);
        assert_eq!(delta["squat"].count, 3);
        assert_eq!(delta["squat"].avg_calories, Some(15.0));
        assert_eq!(delta["plank"].count, 1);
        assert_eq!(delta["plank"].avg_calories, None);
    }

    #[test]
    fn merge_with_empty_delta_is_identity() {
        let mut row = ExerciseAggregate::new("deadlift");
        row.count = Some(4);
        row.median_intensity = Some(7.0);
        row.extra.insert("muscle".into(), "back".into());
        let existing = AggregateTable {
            extra_columns: vec!["muscle".into()],
            rows: vec![row, ExerciseAggregate::new("bench")],
        };
        assert_eq!(merge(&existing, &BTreeMap::new()), existing);
    }

    #[test]
    fn merge_overrides_recomputed_fields_and_keeps_the_rest() {
        let mut stored = ExerciseAggregate::new("squat");
        stored.count = Some(1);
        stored.avg_calories = Some(5.0);
        stored.avg_duration = Some(11.0);
        stored.median_intensity = Some(8.0);
        stored.score = Some(0.4);
        let mut untouched = ExerciseAggregate::new("yoga");
        untouched.avg_calories = Some(2.0);
        let existing = AggregateTable {
            extra_columns: vec![],
            rows: vec![untouched.clone(), stored],
        };

        let mut delta = BTreeMap::new();
        delta.insert(
            "squat".to_string(),
            AggregateDelta {
                count: 3,
                avg_calories: Some(12.0),
            },
        );
        delta.insert(
            "lunge".to_string(),
            AggregateDelta {
                count: 2,
                avg_calories: None,
            },
        );
        delta.insert(
            "curl".to_string(),
            AggregateDelta {
                count: 1,
                avg_calories: Some(3.0),
            },
        );

        let merged = merge(&existing, &delta);
        let keys: Vec<_> = merged.rows.iter().map(|r| r.exercise_key.as_str()).collect();
        assert_eq!(keys, vec!["yoga", "squat", "curl", "lunge"]);

        assert_eq!(merged.get("yoga"), Some(&untouched));
        let squat = merged.get("squat").unwrap();
        assert_eq!(squat.count, Some(3));
        assert_eq!(squat.avg_calories, Some(12.0));
        assert_eq!(squat.avg_duration, Some(11.0));
        assert_eq!(squat.median_intensity, Some(8.0));
        assert_eq!(squat.score, Some(0.4));
        assert_eq!(merged.get("lunge").unwrap().avg_calories, None);
    }

    #[test]
    fn delta_without_duration_keeps_stored_calories() {
        let mut stored = ExerciseAggregate::new("plank");
        stored.avg_calories = Some(6.5);
        let existing = AggregateTable {
            extra_columns: vec![],
            rows: vec![stored],
        };
        let delta = compute_delta(&[ev(Some("plank"), None)]);
        let merged = merge(&existing, &delta);
        assert_eq!(merged.rows[0].avg_calories, Some(6.5));
        assert_eq!(merged.rows[0].count, Some(1));
    }

    #[test]
    fn load_accepts_partial_columns_and_pandas_style_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exercise_stats.csv");
        fs::write(
            &path,
            "exercise_key,count,median_intensity,muscle\nsquat,3.0,7.5,legs\nplank,,NaN,core\n",
        )
        .unwrap();
        let table = AggregateStore::new(&path).load().unwrap();
        assert_eq!(table.extra_columns, vec!["muscle".to_string()]);
        let squat = table.get("squat").unwrap();
        assert_eq!(squat.count, Some(3));
        assert_eq!(squat.median_intensity, Some(7.5));
        assert_eq!(squat.avg_calories, None);
        assert_eq!(squat.extra["muscle"], "legs");
        let plank = table.get("plank").unwrap();
        assert_eq!(plank.count, None);
        assert_eq!(plank.median_intensity, None);
    }

    #[test]
    fn save_then_load_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = AggregateStore::new(dir.path().join("stats.csv"));
        let mut row = ExerciseAggregate::new("squat");
        row.count = Some(2);
        row.avg_calories = Some(12.5);
        row.score = Some(0.6);
        row.extra.insert("muscle".into(), "legs".into());
        let table = AggregateTable {
            extra_columns: vec!["muscle".into()],
            rows: vec![row],
        };
        store.save(&table).unwrap();
        let first = fs::read(store.path()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, table);
        store.save(&loaded).unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }

    #[test]
    fn missing_key_column_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        fs::write(&path, "name,count\nsquat,1\n").unwrap();
        assert!(matches!(
            AggregateStore::new(&path).load(),
            Err(PipelineError::AggregateCorruption { .. })
        ));
    }

    #[test]
    fn non_numeric_metric_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        fs::write(&path, "exercise_key,avg_calories\nsquat,lots\n").unwrap();
        let err = AggregateStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("avg_calories"));
    }

    #[test]
    fn missing_or_empty_file_is_an_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.csv");
        assert!(AggregateStore::new(&path).load().unwrap().is_empty());
        fs::write(&path, "").unwrap();
        assert!(AggregateStore::new(&path).load().unwrap().is_empty());
    }
}
