// src/analyze/mod.rs
//! Aggregate → score → ranked recommendations.

pub mod rank;
pub mod scoring;

// Re-export convenient types.
pub use crate::analyze::rank::{rank, RecommendationEntry};
pub use crate::analyze::scoring::{score_rows, ScoringPlan, EPSILON, SCORE_WEIGHTS};

use crate::store::aggregates::AggregateTable;

/// Score the table in place and return its ranking.
pub fn score_and_rank(table: &mut AggregateTable) -> (ScoringPlan, Vec<RecommendationEntry>) {
    let plan = score_rows(&mut table.rows);
    let ranked = rank(&table.rows);
    (plan, ranked)
}
