use crate::models::{Outcome, ReviewResult};
use chrono::{Duration, NaiveDate};

pub const MIN_EASE: f64 = 1.3;
pub const DEFAULT_EASE: f64 = 2.5;
pub const MAX_EASE: f64 = 3.0;
pub const FIRST_INTERVAL: i64 = 1; // days
pub const SECOND_INTERVAL: i64 = 6; // days

const EASE_BONUS: f64 = 0.1;
const EASE_PENALTY: f64 = 0.2;

/// Calculates the next review interval and ease factor from a two-valued outcome.
///
/// This is SM-2 reduced to pass/fail:
/// Correct:   repetitions + 1, ease + 0.1 (capped at 3.0),
///            interval 1 day, then 6 days, then prior interval * new ease.
/// Incorrect: repetitions reset to 0, interval reset to 1 day,
///            ease - 0.2 (floored at 1.3).
///
/// The due date is `reference_date` plus the new interval in calendar days.
pub fn compute_next(
    outcome: Outcome,
    prior_ease: f64,
    prior_interval: i64,
    prior_repetitions: u32,
    reference_date: NaiveDate,
) -> ReviewResult {
    let (ease_factor, interval_days, repetitions) = match outcome {
        Outcome::Correct => {
            let repetitions = prior_repetitions.saturating_add(1);
            let ease = clamp_ease(prior_ease + EASE_BONUS);
            let interval = match repetitions {
                1 => FIRST_INTERVAL,
                2 => SECOND_INTERVAL,
                // f64::round is half-away-from-zero, i.e. half-up for positive values
                _ => ((prior_interval as f64 * ease).round() as i64).max(1),
            };
            (ease, interval, repetitions)
        }
        Outcome::Incorrect => (clamp_ease(prior_ease - EASE_PENALTY), FIRST_INTERVAL, 0),
    };

    ReviewResult {
        ease_factor,
        interval_days,
        repetitions,
        next_review_date: reference_date + Duration::days(interval_days),
    }
}

/// Schedules a question that has never been reviewed.
pub fn compute_first(outcome: Outcome, reference_date: NaiveDate) -> ReviewResult {
    compute_next(outcome, DEFAULT_EASE, 0, 0, reference_date)
}

/// True when a stored ease factor could have been produced by this calculator.
pub fn is_valid_ease(ease: f64) -> bool {
    (MIN_EASE..=MAX_EASE).contains(&ease)
}

// Rounds away binary drift from the 0.1/0.2 steps (2.6 + 0.1 is not 2.7 in f64)
// without touching ease factors stored at finer precision.
fn clamp_ease(ease: f64) -> f64 {
    let rounded = (ease * 1e9).round() / 1e9;
    rounded.clamp(MIN_EASE, MAX_EASE)
}
