//! Recommendation score from aggregate metrics.
//!
//! Two metrics feed the score: `avg_calories` and `median_intensity`. Each
//! is min-max normalized over the whole table,
//!
//! `norm(x) = (x - min) / (max - min + EPSILON)`
//!
//! and combined as `0.6 * cal_norm + 0.4 * int_norm`. The epsilon keeps a
//! constant column (or a single-row table) at zero instead of dividing by
//! zero, so results stay in `[0, 1]` up to a tiny slack near 1.
//!
//! When either metric is absent from every row the table cannot be scored;
//! rows then keep any score they already have and default to `0.0`.

use crate::store::aggregates::ExerciseAggregate;

pub const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    pub calories: f64,
    pub intensity: f64,
}

pub const SCORE_WEIGHTS: ScoreWeights = ScoreWeights {
    calories: 0.6,
    intensity: 0.4,
};

/// Observed range of one metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn over<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        values.into_iter().fold(None, |acc, x| {
            Some(match acc {
                None => MinMax { min: x, max: x },
                Some(m) => MinMax {
                    min: m.min.min(x),
                    max: m.max.max(x),
                },
            })
        })
    }

    pub fn norm(&self, x: f64) -> f64 {
        (x - self.min) / (self.max - self.min + EPSILON)
    }
}

/// Which scoring path a table qualifies for.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScoringPlan {
    /// Both metrics exist somewhere in the table.
    Normalized { calories: MinMax, intensity: MinMax },
    /// At least one metric is missing everywhere.
    Fallback,
}

impl ScoringPlan {
    /// Rows missing a metric count as `0.0` for that metric.
    pub fn for_rows(rows: &[ExerciseAggregate]) -> Self {
        let has_calories = rows.iter().any(|r| r.avg_calories.is_some());
        let has_intensity = rows.iter().any(|r| r.median_intensity.is_some());
        if !(has_calories && has_intensity) {
            return ScoringPlan::Fallback;
        }

        let calories = MinMax::over(rows.iter().map(calories_or_zero));
        let intensity = MinMax::over(rows.iter().map(intensity_or_zero));
        match (calories, intensity) {
            (Some(calories), Some(intensity)) => ScoringPlan::Normalized {
                calories,
                intensity,
            },
            _ => ScoringPlan::Fallback,
        }
    }

    pub fn score_row(&self, row: &ExerciseAggregate) -> f64 {
        match self {
            ScoringPlan::Normalized {
                calories,
                intensity,
            } => {
                SCORE_WEIGHTS.calories * calories.norm(calories_or_zero(row))
                    + SCORE_WEIGHTS.intensity * intensity.norm(intensity_or_zero(row))
            }
            ScoringPlan::Fallback => row.score.unwrap_or(0.0),
        }
    }
}

fn calories_or_zero(row: &ExerciseAggregate) -> f64 {
    row.avg_calories.unwrap_or(0.0)
}

fn intensity_or_zero(row: &ExerciseAggregate) -> f64 {
    row.median_intensity.unwrap_or(0.0)
}

/// Score every row in place. Returns the plan that was applied.
pub fn score_rows(rows: &mut [ExerciseAggregate]) -> ScoringPlan {
    let plan = ScoringPlan::for_rows(rows);
    for row in rows.iter_mut() {
        row.score = Some(plan.score_row(row));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(key: &str, cal: Option<f64>, int: Option<f64>) -> ExerciseAggregate {
        ExerciseAggregate {
            avg_calories: cal,
            median_intensity: int,
            ..ExerciseAggregate::new(key)
        }
    }

    #[test]
    fn scores_stay_within_unit_interval() {
        let mut rows = vec![
            row("a", Some(120.0), Some(3.0)),
            row("b", Some(40.0), Some(9.5)),
            row("c", Some(300.0), None),
            row("d", None, Some(6.0)),
        ];
        let plan = score_rows(&mut rows);
        assert!(matches!(plan, ScoringPlan::Normalized { .. }));
        for r in &rows {
            let s = r.score.unwrap();
            assert!((-EPSILON..=1.0 + EPSILON).contains(&s), "{}: {s}", r.exercise_key);
        }
    }

    #[test]
    fn weights_are_sixty_forty() {
        let mut rows = vec![row("lo", Some(0.0), Some(0.0)), row("hi", Some(10.0), Some(0.0))];
        score_rows(&mut rows);
        assert!((rows[1].score.unwrap() - 0.6).abs() < 1e-6);

        let mut rows = vec![row("lo", Some(0.0), Some(0.0)), row("hi", Some(0.0), Some(10.0))];
        score_rows(&mut rows);
        assert!((rows[1].score.unwrap() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn single_row_relies_on_epsilon() {
        let mut rows = vec![row("solo", Some(50.0), Some(7.0))];
        score_rows(&mut rows);
        assert_eq!(rows[0].score, Some(0.0));
    }

    #[test]
    fn identical_metrics_get_identical_scores() {
        let mut rows = vec![row("b", Some(5.0), Some(5.0)), row("a", Some(5.0), Some(5.0))];
        score_rows(&mut rows);
        assert_eq!(rows[0].score, rows[1].score);
    }

    #[test]
    fn missing_metric_falls_back_and_preserves_prior_score() {
        let mut prior = row("kept", Some(10.0), None);
        prior.score = Some(0.75);
        let mut rows = vec![prior, row("fresh", Some(20.0), None)];
        let plan = score_rows(&mut rows);
        assert_eq!(plan, ScoringPlan::Fallback);
        assert_eq!(rows[0].score, Some(0.75));
        assert_eq!(rows[1].score, Some(0.0));
    }

    #[test]
    fn empty_table_is_fallback() {
        assert_eq!(ScoringPlan::for_rows(&[]), ScoringPlan::Fallback);
    }
}
