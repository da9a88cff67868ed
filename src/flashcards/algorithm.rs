//! SM-2 Spaced Repetition Algorithm
//!
//! Implementation of the SuperMemo 2 algorithm for calculating
//! review intervals based on recall quality.
//!
//! Grades (0-5):
//! - 0: Complete blackout, no recall
//! - 1: Incorrect, but upon seeing answer, remembered
//! - 2: Incorrect, but answer seemed easy to recall
//! - 3: Correct response with serious difficulty
//! - 4: Correct response after hesitation
//! - 5: Perfect response with no hesitation
//!
//! Rounding: the grown interval and the ease factor (to two decimals) are both
//! rounded half-to-even, so `12.5` days becomes 12 and `13.5` becomes 14.

use chrono::{DateTime, Duration, Utc};

use super::errors::{CardError, Result};
use super::models::SchedulingState;

/// Minimum ease factor allowed
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Lowest grade that counts as a successful recall
pub const PASSING_GRADE: i32 = 3;

pub const MAX_GRADE: i32 = 5;

/// Intervals are capped so due dates stay representable
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Result of calculating the next review
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub repetitions: u32,
    pub ease_factor: f64,
    pub interval: u32,
    pub next_review_at: DateTime<Utc>,
}

impl From<ReviewResult> for SchedulingState {
    fn from(result: ReviewResult) -> Self {
        Self {
            interval: result.interval,
            ease_factor: result.ease_factor,
            repetitions: result.repetitions,
            next_review_at: Some(result.next_review_at),
        }
    }
}

/// Calculate the next review state using the SM-2 algorithm
///
/// # Arguments
/// * `grade` - Recall quality (0-5)
/// * `repetitions` - Consecutive successful reviews so far
/// * `ease_factor` - Current ease factor
/// * `interval` - Current interval in days
/// * `now` - Reference time the next review is scheduled from
///
/// # Returns
/// ReviewResult with new repetitions, ease factor, interval, and due time
pub fn calculate_next_review(
    grade: i32,
    repetitions: u32,
    ease_factor: f64,
    interval: u32,
    now: DateTime<Utc>,
) -> Result<ReviewResult> {
    if !(0..=MAX_GRADE).contains(&grade) {
        return Err(CardError::Validation(format!(
            "Grade must be between 0 and {}, got {}",
            MAX_GRADE, grade
        )));
    }

    let (new_repetitions, new_interval) = if grade < PASSING_GRADE {
        // Failed recall resets progress
        (0, 1)
    } else {
        let next = match repetitions {
            0 => 1,
            1 => 6,
            _ => grow_interval(interval, ease_factor),
        };
        (repetitions.saturating_add(1), next)
    };

    // EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02)), applied for every grade
    let miss = f64::from(MAX_GRADE - grade);
    let raw_ease = ease_factor + (0.1 - miss * (0.08 + miss * 0.02));
    let new_ease_factor = round_ease(raw_ease.max(MIN_EASE_FACTOR));

    Ok(ReviewResult {
        repetitions: new_repetitions,
        ease_factor: new_ease_factor,
        interval: new_interval,
        next_review_at: now + Duration::days(i64::from(new_interval)),
    })
}

/// Shorthand for [`calculate_next_review`] from a stored state
pub fn next_state(grade: i32, state: &SchedulingState, now: DateTime<Utc>) -> Result<ReviewResult> {
    calculate_next_review(grade, state.repetitions, state.ease_factor, state.interval, now)
}

fn grow_interval(interval: u32, ease_factor: f64) -> u32 {
    let grown = (f64::from(interval) * ease_factor).round_ties_even();
    if grown >= f64::from(MAX_INTERVAL_DAYS) {
        MAX_INTERVAL_DAYS
    } else {
        grown.max(0.0) as u32
    }
}

fn round_ease(ease_factor: f64) -> f64 {
    (ease_factor * 100.0).round_ties_even() / 100.0
}

/// Intervals each grade 0-5 would produce from `state`.
/// Used to show users what each answer would schedule.
pub fn preview_intervals(state: &SchedulingState) -> [u32; 6] {
    let now = Utc::now();
    let mut intervals = [0; 6];
    for (grade, slot) in (0..=MAX_GRADE).zip(intervals.iter_mut()) {
        if let Ok(result) = next_state(grade, state, now) {
            *slot = result.interval;
        }
    }
    intervals
}

/// Format an interval in days to a human-readable string
pub fn format_interval(days: u32) -> String {
    if days == 0 {
        "now".to_string()
    } else if days < 7 {
        format!("{}d", days)
    } else if days < 30 {
        format!("{}w", days / 7)
    } else if days < 365 {
        format!("{}mo", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}
