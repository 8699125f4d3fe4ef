// src/analyze/rank.rs
//! Ranking: score descending, ties broken by `exercise_key` ascending so
//! identical inputs always produce identical output files.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::store::aggregates::ExerciseAggregate;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub exercise_key: String,
    pub score: f64,
}

impl RecommendationEntry {
    pub fn new(exercise_key: impl Into<String>, score: f64) -> Self {
        Self {
            exercise_key: exercise_key.into(),
            score,
        }
    }
}

/// One entry per aggregate row. Unscored rows rank as `0.0`.
pub fn rank(rows: &[ExerciseAggregate]) -> Vec<RecommendationEntry> {
    let mut entries: Vec<RecommendationEntry> = rows
        .iter()
        .map(|r| RecommendationEntry::new(r.exercise_key.clone(), r.score.unwrap_or(0.0)))
        .collect();
    entries.sort_by(by_score_then_key);
    entries
}

fn by_score_then_key(a: &RecommendationEntry, b: &RecommendationEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.exercise_key.cmp(&b.exercise_key))
}
