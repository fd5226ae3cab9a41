//! Menstrual cycle statistics.
//!
//! Groups raw flow days into periods, derives cycle lengths from consecutive
//! period starts, and grades how regular the history is. Pure and
//! synchronous; the manager supplies the records.

use chrono::NaiveDate;

use crate::records::{MenstrualRecord, UserSettings};
use crate::temperature::TemperatureShift;

/// Flow days at most this many days apart belong to the same period.
const MAX_PERIOD_GAP_DAYS: i64 = 2;
/// A luteal phase longer than this is not believable and falls back to the
/// configured average.
const MAX_LUTEAL_DAYS: i64 = 20;

/// A contiguous run of menstrual flow days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Inclusive day count.
    pub duration_days: i64,
}

/// How regular the cycle history is, graded on the standard deviation of
/// cycle lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regularity {
    VeryRegular,
    Regular,
    SomewhatIrregular,
    Irregular,
}

impl Regularity {
    pub fn from_std_dev(std_dev: f64) -> Self {
        if std_dev <= 2.0 {
            Regularity::VeryRegular
        } else if std_dev <= 4.0 {
            Regularity::Regular
        } else if std_dev <= 7.0 {
            Regularity::SomewhatIrregular
        } else {
            Regularity::Irregular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Regularity::VeryRegular => "very regular",
            Regularity::Regular => "regular",
            Regularity::SomewhatIrregular => "somewhat irregular",
            Regularity::Irregular => "irregular",
        }
    }
}

/// Cycle statistics over at least two recorded periods.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleStats {
    pub periods: Vec<Period>,
    /// Start-to-start distances between consecutive periods, in days.
    pub cycle_lengths: Vec<i64>,
    pub average_cycle_length: f64,
    /// Sample standard deviation of the cycle lengths; needs at least 3
    /// periods.
    pub std_dev: Option<f64>,
    pub regularity: Option<Regularity>,
    /// `max(0, 1 - sigma/7)`, rounded to two decimals.
    pub regularity_score: Option<f64>,
}

/// Outcome of cycle analysis; thin history is a reportable result, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleAnalysis {
    Insufficient { reason: String },
    Ready(CycleStats),
}

impl CycleAnalysis {
    pub fn stats(&self) -> Option<&CycleStats> {
        match self {
            CycleAnalysis::Ready(stats) => Some(stats),
            CycleAnalysis::Insufficient { .. } => None,
        }
    }
}

/// Group flow days into periods.
///
/// Days with actual flow that are consecutive, or separated by a gap of at
/// most two days, form one period; a wider gap starts the next one.
pub fn group_periods(records: &[MenstrualRecord]) -> Vec<Period> {
    let mut days: Vec<NaiveDate> = records
        .iter()
        .filter(|r| r.flow.is_flow())
        .map(|r| r.date)
        .collect();
    days.sort();
    days.dedup();

    let mut periods = Vec::new();
    let mut run: Option<(NaiveDate, NaiveDate)> = None;

    for day in days {
        match run {
            Some((start, end)) if (day - end).num_days() <= MAX_PERIOD_GAP_DAYS => {
                run = Some((start, day));
            }
            Some((start, end)) => {
                periods.push(make_period(start, end));
                run = Some((day, day));
            }
            None => run = Some((day, day)),
        }
    }
    if let Some((start, end)) = run {
        periods.push(make_period(start, end));
    }
    periods
}

fn make_period(start: NaiveDate, end: NaiveDate) -> Period {
    Period {
        start,
        end,
        duration_days: (end - start).num_days() + 1,
    }
}

/// Sample standard deviation (n - 1 in the denominator).
fn sample_std_dev(values: &[i64]) -> f64 {
    let n = values.len();
    let mean = values.iter().sum::<i64>() as f64 / n as f64;
    let sum_sq: f64 = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum();
    (sum_sq / (n - 1) as f64).sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute cycle statistics from grouped periods.
///
/// Needs at least two periods for lengths and averages; regularity grading
/// additionally needs a third.
pub fn analyze_cycles(periods: &[Period]) -> CycleAnalysis {
    if periods.len() < 2 {
        return CycleAnalysis::Insufficient {
            reason: format!(
                "cycle statistics need at least 2 recorded periods, have {}",
                periods.len()
            ),
        };
    }

    let cycle_lengths: Vec<i64> = periods
        .windows(2)
        .map(|pair| (pair[1].start - pair[0].start).num_days())
        .collect();
    let average_cycle_length =
        cycle_lengths.iter().sum::<i64>() as f64 / cycle_lengths.len() as f64;

    let (std_dev, regularity, regularity_score) = if periods.len() >= 3 {
        let sigma = sample_std_dev(&cycle_lengths);
        let score = round2((1.0 - sigma / 7.0).max(0.0));
        (Some(sigma), Some(Regularity::from_std_dev(sigma)), Some(score))
    } else {
        (None, None, None)
    };

    CycleAnalysis::Ready(CycleStats {
        periods: periods.to_vec(),
        cycle_lengths,
        average_cycle_length,
        std_dev,
        regularity,
        regularity_score,
    })
}

/// Average luteal phase length in days.
///
/// When a temperature shift is known and the next period started within 20
/// days of it, the measured gap wins; otherwise the user's configured
/// average applies.
pub fn average_luteal_phase(
    shift: Option<&TemperatureShift>,
    periods: &[Period],
    settings: &UserSettings,
) -> f64 {
    if let Some(shift) = shift {
        let next_start = periods
            .iter()
            .map(|p| p.start)
            .find(|&start| start > shift.shift_date);
        if let Some(start) = next_start {
            let gap = (start - shift.shift_date).num_days();
            if gap > 0 && gap <= MAX_LUTEAL_DAYS {
                return gap as f64;
            }
        }
    }
    settings.average_luteal_phase
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::records::FlowLevel;
    use crate::temperature::ShiftConfidence;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn flow_day(d: NaiveDate) -> MenstrualRecord {
        MenstrualRecord {
            date: d,
            flow: FlowLevel::Medium,
            is_start: false,
            is_end: false,
        }
    }

    /// Periods of fixed 5-day duration starting at the given dates.
    fn periods_at(starts: &[NaiveDate]) -> Vec<Period> {
        starts
            .iter()
            .map(|&start| make_period(start, start + Duration::days(4)))
            .collect()
    }

    // ==================== Period Grouping Tests ====================

    #[test]
    fn test_group_periods_empty() {
        assert!(group_periods(&[]).is_empty());
    }

    #[test]
    fn test_group_periods_single_run() {
        let records: Vec<_> = (1..=5).map(|d| flow_day(date(2025, 1, d))).collect();
        let periods = group_periods(&records);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, date(2025, 1, 1));
        assert_eq!(periods[0].end, date(2025, 1, 5));
        assert_eq!(periods[0].duration_days, 5);
    }

    #[test]
    fn test_group_periods_two_day_gap_stays_joined() {
        // Flow on the 1st, 2nd and 4th: the skipped 3rd does not split.
        let records = vec![
            flow_day(date(2025, 1, 1)),
            flow_day(date(2025, 1, 2)),
            flow_day(date(2025, 1, 4)),
        ];
        let periods = group_periods(&records);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].duration_days, 4);
    }

    #[test]
    fn test_group_periods_three_day_gap_splits() {
        let records = vec![
            flow_day(date(2025, 1, 1)),
            flow_day(date(2025, 1, 2)),
            flow_day(date(2025, 1, 5)),
        ];
        let periods = group_periods(&records);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].start, date(2025, 1, 5));
    }

    #[test]
    fn test_group_periods_ignores_none_flow() {
        let mut none_day = flow_day(date(2025, 1, 3));
        none_day.flow = FlowLevel::None;
        let records = vec![flow_day(date(2025, 1, 1)), none_day];
        let periods = group_periods(&records);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].duration_days, 1);
    }

    #[test]
    fn test_group_periods_unsorted_and_duplicated_input() {
        let records = vec![
            flow_day(date(2025, 2, 2)),
            flow_day(date(2025, 1, 1)),
            flow_day(date(2025, 2, 2)),
            flow_day(date(2025, 2, 1)),
        ];
        let periods = group_periods(&records);
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[1].start, date(2025, 2, 1));
        assert_eq!(periods[1].duration_days, 2);
    }

    // ==================== Cycle Statistics Tests ====================

    #[test]
    fn test_analyze_cycles_insufficient_below_two_periods() {
        let result = analyze_cycles(&periods_at(&[date(2025, 1, 1)]));
        assert!(matches!(result, CycleAnalysis::Insufficient { .. }));
    }

    #[test]
    fn test_analyze_cycles_two_periods_have_length_but_no_regularity() {
        let starts = [date(2025, 1, 1), date(2025, 1, 29)];
        let stats = analyze_cycles(&periods_at(&starts)).stats().cloned().unwrap();
        assert_eq!(stats.cycle_lengths, vec![28]);
        assert_eq!(stats.average_cycle_length, 28.0);
        assert!(stats.regularity.is_none());
        assert!(stats.regularity_score.is_none());
    }

    #[test]
    fn test_regularity_reference_example() {
        // Cycle lengths [28, 29, 27, 30, 28, 26, 29]: mean about 28.14,
        // sample std dev about 1.35: "regular", score 0.81.
        let lengths = [28i64, 29, 27, 30, 28, 26, 29];
        let mut starts = vec![date(2025, 1, 1)];
        for &len in &lengths {
            let last = *starts.last().unwrap();
            starts.push(last + Duration::days(len));
        }

        let stats = analyze_cycles(&periods_at(&starts)).stats().cloned().unwrap();
        assert_eq!(stats.cycle_lengths, lengths.to_vec());
        assert!((stats.average_cycle_length - 28.142857).abs() < 1e-4);

        let sigma = stats.std_dev.unwrap();
        assert!((sigma - 1.345).abs() < 0.01, "sigma = {sigma}");
        assert_eq!(stats.regularity, Some(Regularity::Regular));
        assert_eq!(stats.regularity_score, Some(0.81));
    }

    #[test]
    fn test_regularity_labels_by_sigma() {
        assert_eq!(Regularity::from_std_dev(1.9), Regularity::VeryRegular);
        assert_eq!(Regularity::from_std_dev(2.0), Regularity::VeryRegular);
        assert_eq!(Regularity::from_std_dev(3.5), Regularity::Regular);
        assert_eq!(Regularity::from_std_dev(6.0), Regularity::SomewhatIrregular);
        assert_eq!(Regularity::from_std_dev(7.1), Regularity::Irregular);
    }

    #[test]
    fn test_regularity_score_floors_at_zero() {
        // Wildly varying lengths: std dev far above 7 must clamp the score to 0.
        let starts = [
            date(2025, 1, 1),
            date(2025, 1, 20),
            date(2025, 3, 15),
            date(2025, 4, 1),
        ];
        let stats = analyze_cycles(&periods_at(&starts)).stats().cloned().unwrap();
        assert_eq!(stats.regularity_score, Some(0.0));
        assert_eq!(stats.regularity, Some(Regularity::Irregular));
    }

    // ==================== Luteal Phase Tests ====================

    fn shift_on(d: NaiveDate) -> TemperatureShift {
        TemperatureShift {
            shift_date: d,
            cover_line: Some(36.5),
            confidence: ShiftConfidence::Medium,
            ovulation_date: d - Duration::days(1),
        }
    }

    #[test]
    fn test_luteal_uses_measured_gap() {
        let shift = shift_on(date(2025, 1, 15));
        let periods = periods_at(&[date(2025, 1, 1), date(2025, 1, 28)]);
        let luteal = average_luteal_phase(Some(&shift), &periods, &UserSettings::default());
        assert_eq!(luteal, 13.0);
    }

    #[test]
    fn test_luteal_falls_back_when_gap_too_long() {
        let shift = shift_on(date(2025, 1, 2));
        let periods = periods_at(&[date(2025, 1, 1), date(2025, 1, 28)]);
        // 26-day gap is not a believable luteal phase.
        let luteal = average_luteal_phase(Some(&shift), &periods, &UserSettings::default());
        assert_eq!(luteal, 14.0);
    }

    #[test]
    fn test_luteal_falls_back_without_shift() {
        let periods = periods_at(&[date(2025, 1, 1), date(2025, 1, 28)]);
        let settings = UserSettings {
            average_luteal_phase: 12.0,
            ..UserSettings::default()
        };
        assert_eq!(average_luteal_phase(None, &periods, &settings), 12.0);
    }

    #[test]
    fn test_luteal_ignores_periods_before_shift() {
        let shift = shift_on(date(2025, 1, 15));
        // Only one period, and it starts before the shift.
        let periods = periods_at(&[date(2025, 1, 1)]);
        let luteal = average_luteal_phase(Some(&shift), &periods, &UserSettings::default());
        assert_eq!(luteal, 14.0);
    }
}
