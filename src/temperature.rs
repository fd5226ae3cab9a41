//! Basal body temperature shift detection.
//!
//! A completed ovulation shows up as a biphasic pattern: a run of low
//! pre-ovulatory temperatures followed by a sustained rise of a few tenths of
//! a degree. The detector finds the most recent such transition, derives the
//! cover-line separating the two phases, and backdates ovulation to the day
//! before the rise.

use chrono::{Duration, NaiveDate};

use crate::validate::{MAX_TEMPERATURE, MIN_TEMPERATURE};

/// Nominal minimum number of daily readings for a detection attempt.
pub const MIN_SAMPLES_NOMINAL: usize = 10;
/// Hard minimum: exactly 6 low-phase + 3 high-phase days.
pub const MIN_SAMPLES: usize = 9;

/// Required rise of the high-phase mean over the pre-shift mean, in °C.
const SHIFT_THRESHOLD: f64 = 0.2;
/// Pre-shift comparison window (days before the candidate).
const PRE_WINDOW: usize = 6;
/// High-phase window (days from the candidate on).
const POST_WINDOW: usize = 3;
/// Cover-line sits this far above the warmest pre-shift day.
const COVER_LINE_OFFSET: f64 = 0.1;

/// Tolerance for comparisons between one-decimal temperature values.
const EPS: f64 = 1e-9;

/// How clearly the detected shift stands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShiftConfidence {
    Low,
    Medium,
    High,
}

impl ShiftConfidence {
    /// Numeric weight used when combining estimators.
    pub fn score(&self) -> f64 {
        match self {
            ShiftConfidence::Low => 0.4,
            ShiftConfidence::Medium => 0.6,
            ShiftConfidence::High => 0.8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftConfidence::Low => "low",
            ShiftConfidence::Medium => "medium",
            ShiftConfidence::High => "high",
        }
    }
}

/// A detected low-to-high temperature transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureShift {
    /// First day of the high phase.
    pub shift_date: NaiveDate,
    /// Threshold separating the phases, rounded to one decimal. Absent when
    /// the pre-shift window is too thin to anchor it.
    pub cover_line: Option<f64>,
    pub confidence: ShiftConfidence,
    /// Ovulation precedes the thermal rise by about a day.
    pub ovulation_date: NaiveDate,
}

/// Outcome of a detection attempt. "Nothing found" is a normal result, not
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ShiftDetection {
    /// Too little usable history to even attempt detection.
    Insufficient { reason: String },
    /// Enough data, but no biphasic transition present.
    NotDetected,
    Detected(TemperatureShift),
}

impl ShiftDetection {
    pub fn detected(&self) -> bool {
        matches!(self, ShiftDetection::Detected(_))
    }

    pub fn shift(&self) -> Option<&TemperatureShift> {
        match self {
            ShiftDetection::Detected(shift) => Some(shift),
            _ => None,
        }
    }
}

/// 3-day centered moving average of a daily series; endpoints average the
/// neighbors they have. Exposed for charting.
pub fn moving_average(samples: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    let n = samples.len();
    samples
        .iter()
        .enumerate()
        .map(|(i, &(date, _))| {
            let lo = i.saturating_sub(1);
            let hi = (i + 2).min(n);
            let window = &samples[lo..hi];
            let avg = window.iter().map(|&(_, t)| t).sum::<f64>() / window.len() as f64;
            (date, avg)
        })
        .collect()
}

fn mean(points: &[(NaiveDate, f64)]) -> f64 {
    points.iter().map(|&(_, t)| t).sum::<f64>() / points.len() as f64
}

fn max_temp(points: &[(NaiveDate, f64)]) -> f64 {
    points.iter().map(|&(_, t)| t).fold(f64::NEG_INFINITY, f64::max)
}

fn min_temp(points: &[(NaiveDate, f64)]) -> f64 {
    points.iter().map(|&(_, t)| t).fold(f64::INFINITY, f64::min)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Detect the most recent temperature shift in a daily series.
///
/// `samples` holds at most one reading per calendar day (the record layer
/// guarantees this); order does not matter. Readings outside the plausible
/// basal range are discarded before analysis.
///
/// A candidate day `i` starts a shift when the mean of the 3 days from `i`
/// exceeds the mean of the up-to-6 preceding days by at least 0.2 °C *and*
/// every one of the 3 high days clears the warmest preceding day by the same
/// margin. The second condition is what keeps the scan from "re-detecting"
/// the shift on every later day as the comparison window slides into the
/// high phase; with it, the latest valid candidate is the true onset of the
/// most recent cycle's rise.
pub fn detect_temperature_shift(samples: &[(NaiveDate, f64)]) -> ShiftDetection {
    let mut points: Vec<(NaiveDate, f64)> = samples
        .iter()
        .copied()
        .filter(|&(_, t)| (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&t))
        .collect();
    points.sort_by_key(|&(date, _)| date);

    let n = points.len();
    if n < MIN_SAMPLES {
        return ShiftDetection::Insufficient {
            reason: format!(
                "need at least {MIN_SAMPLES_NOMINAL} daily temperatures \
                 ({MIN_SAMPLES} when they split into exactly 6 low and 3 high days), have {n}"
            ),
        };
    }

    let mut best: Option<usize> = None;
    for i in (PRE_WINDOW - 1)..=(n - POST_WINDOW) {
        let pre = &points[i.saturating_sub(PRE_WINDOW)..i];
        let post = &points[i..i + POST_WINDOW];

        let rise = mean(post) - mean(pre);
        let separation = min_temp(post) - max_temp(pre);
        if rise + EPS >= SHIFT_THRESHOLD && separation + EPS >= SHIFT_THRESHOLD {
            best = Some(i);
        }
    }

    let Some(i) = best else {
        return ShiftDetection::NotDetected;
    };

    let pre = &points[i.saturating_sub(PRE_WINDOW)..i];
    let post = &points[i..i + POST_WINDOW];
    let rise = mean(post) - mean(pre);
    let (shift_date, shift_value) = points[i];

    // The two days after the candidate show whether the rise holds.
    let sustain = &points[i + 1..i + POST_WINDOW];
    let all_near = sustain
        .iter()
        .all(|&(_, t)| (t - shift_value).abs() <= COVER_LINE_OFFSET + EPS);
    let holding = sustain
        .iter()
        .filter(|&&(_, t)| t + EPS >= shift_value - COVER_LINE_OFFSET)
        .count();

    let confidence = if rise + EPS >= 0.4 && all_near {
        ShiftConfidence::High
    } else if rise + EPS >= 0.3 && holding >= 1 {
        ShiftConfidence::Medium
    } else {
        ShiftConfidence::Low
    };

    let cover_line = if pre.len() >= PRE_WINDOW - 1 {
        Some(round1(max_temp(pre) + COVER_LINE_OFFSET))
    } else {
        None
    };

    ShiftDetection::Detected(TemperatureShift {
        shift_date,
        cover_line,
        confidence,
        ovulation_date: shift_date - Duration::days(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Consecutive daily readings starting at `start`.
    fn series(start: NaiveDate, temps: &[f64]) -> Vec<(NaiveDate, f64)> {
        temps
            .iter()
            .enumerate()
            .map(|(i, &t)| (start + Duration::days(i as i64), t))
            .collect()
    }

    const BIPHASIC: [f64; 10] = [
        36.3, 36.2, 36.4, 36.3, 36.2, 36.7, 36.8, 36.9, 36.8, 36.7,
    ];

    // ==================== Detection Tests ====================

    #[test]
    fn test_detects_reference_shift() {
        let samples = series(date(2025, 1, 1), &BIPHASIC);
        let result = detect_temperature_shift(&samples);

        let shift = result.shift().expect("shift should be detected");
        assert_eq!(shift.shift_date, date(2025, 1, 6));
        assert!(shift.confidence >= ShiftConfidence::Medium);
    }

    #[test]
    fn test_reference_cover_line() {
        let samples = series(date(2025, 1, 1), &BIPHASIC);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.cover_line, Some(36.5));
    }

    #[test]
    fn test_ovulation_precedes_shift_by_one_day() {
        let samples = series(date(2025, 1, 1), &BIPHASIC);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.ovulation_date, date(2025, 1, 5));
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let mut samples = series(date(2025, 1, 1), &BIPHASIC);
        samples.reverse();
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.shift_date, date(2025, 1, 6));
    }

    #[test]
    fn test_monophasic_series_not_detected() {
        let flat = [36.4, 36.5, 36.4, 36.3, 36.4, 36.5, 36.4, 36.4, 36.5, 36.4];
        let samples = series(date(2025, 1, 1), &flat);
        assert_eq!(detect_temperature_shift(&samples), ShiftDetection::NotDetected);
    }

    #[test]
    fn test_picks_most_recent_shift_across_two_cycles() {
        // Two full biphasic cycles back to back; the second rise begins on
        // day 19 (index 18).
        let two_cycles = [
            36.3, 36.2, 36.4, 36.3, 36.2, 36.7, 36.8, 36.9, 36.8, 36.7, // cycle 1
            36.3, 36.2, 36.3, 36.4, 36.2, 36.3, 36.2, 36.3, 36.8, 36.9, 36.8, // cycle 2
        ];
        let samples = series(date(2025, 1, 1), &two_cycles);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.shift_date, date(2025, 1, 19));
    }

    // ==================== Insufficient Data Tests ====================

    #[test]
    fn test_insufficient_below_minimum() {
        let samples = series(date(2025, 1, 1), &BIPHASIC[..8]);
        match detect_temperature_shift(&samples) {
            ShiftDetection::Insufficient { reason } => {
                assert!(reason.contains("temperatures"), "reason: {reason}");
            }
            other => panic!("expected Insufficient, got {other:?}"),
        }
    }

    #[test]
    fn test_nine_points_with_six_three_split_detects() {
        // Exactly 6 low + 3 high days.
        let nine = [36.3, 36.2, 36.4, 36.3, 36.2, 36.3, 36.8, 36.9, 36.8];
        let samples = series(date(2025, 1, 1), &nine);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.shift_date, date(2025, 1, 7));
        // Full 6-day pre-window available here.
        assert_eq!(shift.cover_line, Some(36.5));
    }

    #[test]
    fn test_out_of_range_readings_are_discarded() {
        let mut samples = series(date(2025, 1, 1), &BIPHASIC[..8]);
        // Two implausible readings must not count toward the minimum.
        samples.push((date(2025, 1, 9), 34.0));
        samples.push((date(2025, 1, 10), 43.5));
        assert!(matches!(
            detect_temperature_shift(&samples),
            ShiftDetection::Insufficient { .. }
        ));
    }

    // ==================== Confidence Tests ====================

    #[test]
    fn test_high_confidence_requires_steady_plateau() {
        // Strong rise, then two days within 0.1 °C of the shift value.
        let steady = [36.2, 36.2, 36.3, 36.2, 36.2, 36.2, 36.8, 36.8, 36.9, 36.8];
        let samples = series(date(2025, 1, 1), &steady);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.confidence, ShiftConfidence::High);
    }

    #[test]
    fn test_reference_series_is_medium() {
        // The rise keeps climbing past 0.1 °C above the shift value, so it
        // misses the High plateau condition.
        let samples = series(date(2025, 1, 1), &BIPHASIC);
        let shift = detect_temperature_shift(&samples).shift().cloned().unwrap();
        assert_eq!(shift.confidence, ShiftConfidence::Medium);
    }

    #[test]
    fn test_confidence_scores_are_ordered() {
        assert!(ShiftConfidence::High.score() > ShiftConfidence::Medium.score());
        assert!(ShiftConfidence::Medium.score() > ShiftConfidence::Low.score());
    }

    // ==================== Moving Average Tests ====================

    #[test]
    fn test_moving_average_interior_points() {
        let samples = series(date(2025, 1, 1), &[36.0, 36.3, 36.6]);
        let smoothed = moving_average(&samples);
        assert_eq!(smoothed.len(), 3);
        assert!((smoothed[1].1 - 36.3).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_endpoints_use_available_neighbors() {
        let samples = series(date(2025, 1, 1), &[36.0, 36.4]);
        let smoothed = moving_average(&samples);
        assert!((smoothed[0].1 - 36.2).abs() < 1e-9);
        assert!((smoothed[1].1 - 36.2).abs() < 1e-9);
    }

    #[test]
    fn test_moving_average_empty() {
        assert!(moving_average(&[]).is_empty());
    }
}
