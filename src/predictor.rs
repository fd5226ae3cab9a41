//! Ovulation and fertile-window prediction.
//!
//! Two independent estimators feed one result: the temperature method (from
//! the shift detector) and the cycle method (from period statistics). When
//! both agree within a few days the result is their confidence-weighted
//! midpoint; when they diverge the stronger signal wins unmodified. "Not
//! predictable" is a first-class outcome, never an error.

use chrono::{Datelike, Duration, NaiveDate};

use crate::cycles::{self, CycleAnalysis, CycleStats, Period};
use crate::records::{MenstrualRecord, UserSettings};
use crate::temperature::{self, ShiftDetection, TemperatureShift};

/// Fertile window opens this many days before predicted ovulation.
const FERTILE_LEAD_DAYS: i64 = 5;
/// Fertile window closes this many days after predicted ovulation.
const FERTILE_TRAIL_DAYS: i64 = 1;
/// Optimal window opens this many days before predicted ovulation.
const OPTIMAL_LEAD_DAYS: i64 = 2;
/// Estimates further apart than this are not averaged.
const MAX_COMBINE_GAP_DAYS: i64 = 3;
/// Confidence floor for the cycle method.
const MIN_CYCLE_CONFIDENCE: f64 = 0.3;

/// A single estimator's answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodEstimate {
    pub ovulation_date: NaiveDate,
    /// 0.0..=1.0.
    pub confidence: f64,
}

/// Which estimator produced the final prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMethod {
    Temperature,
    Cycle,
    Combined,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::Temperature => "temperature",
            PredictionMethod::Cycle => "cycle",
            PredictionMethod::Combined => "combined",
        }
    }
}

/// Date ranges anchored to the predicted ovulation date. All bounds
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FertileWindow {
    pub ovulation_date: NaiveDate,
    pub fertile_start: NaiveDate,
    pub fertile_end: NaiveDate,
    pub optimal_start: NaiveDate,
    pub optimal_end: NaiveDate,
}

impl FertileWindow {
    pub fn around(ovulation_date: NaiveDate) -> Self {
        Self {
            ovulation_date,
            fertile_start: ovulation_date - Duration::days(FERTILE_LEAD_DAYS),
            fertile_end: ovulation_date + Duration::days(FERTILE_TRAIL_DAYS),
            optimal_start: ovulation_date - Duration::days(OPTIMAL_LEAD_DAYS),
            optimal_end: ovulation_date,
        }
    }
}

/// Where "today" falls relative to the predicted windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FertilityPhase {
    PreFertile { days_until_window: i64 },
    Fertile { days_to_ovulation: i64 },
    Optimal { days_to_ovulation: i64 },
    PostFertile { days_since_window: i64 },
}

impl FertilityPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FertilityPhase::PreFertile { .. } => "pre_fertile",
            FertilityPhase::Fertile { .. } => "fertile",
            FertilityPhase::Optimal { .. } => "optimal",
            FertilityPhase::PostFertile { .. } => "post_fertile",
        }
    }
}

/// A successful prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct OvulationPrediction {
    pub ovulation_date: NaiveDate,
    pub confidence: f64,
    pub method: PredictionMethod,
    pub window: FertileWindow,
}

impl OvulationPrediction {
    fn new(ovulation_date: NaiveDate, confidence: f64, method: PredictionMethod) -> Self {
        Self {
            ovulation_date,
            confidence,
            method,
            window: FertileWindow::around(ovulation_date),
        }
    }

    pub fn confidence_label(&self) -> &'static str {
        if self.confidence >= 0.75 {
            "high"
        } else if self.confidence >= 0.5 {
            "medium"
        } else {
            "low"
        }
    }
}

/// Prediction outcome; thin history yields `Unavailable`, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Unavailable { reason: String },
    Predicted(OvulationPrediction),
}

impl Prediction {
    pub fn predicted(&self) -> Option<&OvulationPrediction> {
        match self {
            Prediction::Predicted(p) => Some(p),
            Prediction::Unavailable { .. } => None,
        }
    }
}

/// Everything the predictor derived along the way, for callers that chart
/// the underlying signals next to the verdict.
#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub prediction: Prediction,
    pub shift: ShiftDetection,
    pub cycle_analysis: CycleAnalysis,
}

/// Combines the temperature and cycle estimators over history slices.
#[derive(Debug, Clone)]
pub struct OvulationPredictor {
    settings: UserSettings,
}

impl OvulationPredictor {
    pub fn new(settings: UserSettings) -> Self {
        Self { settings }
    }

    /// Run both estimators over raw history and combine their answers.
    pub fn predict(
        &self,
        temperatures: &[(NaiveDate, f64)],
        menstrual: &[MenstrualRecord],
    ) -> PredictionReport {
        let shift = temperature::detect_temperature_shift(temperatures);
        let periods = cycles::group_periods(menstrual);
        let cycle_analysis = cycles::analyze_cycles(&periods);

        let temperature_estimate = shift.shift().map(|s| MethodEstimate {
            ovulation_date: s.ovulation_date,
            confidence: s.confidence.score(),
        });
        let cycle_estimate =
            self.cycle_estimate(&periods, cycle_analysis.stats(), shift.shift());

        PredictionReport {
            prediction: combine_estimates(temperature_estimate, cycle_estimate),
            shift,
            cycle_analysis,
        }
    }

    /// Calendar-based estimate: next ovulation sits one average luteal phase
    /// before the end of the average cycle, counted from the last period
    /// start. Falls back to configured averages while history is thin.
    fn cycle_estimate(
        &self,
        periods: &[Period],
        stats: Option<&CycleStats>,
        shift: Option<&TemperatureShift>,
    ) -> Option<MethodEstimate> {
        let last_start = periods.last()?.start;

        let average_cycle_length = stats
            .map(|s| s.average_cycle_length)
            .unwrap_or(self.settings.average_cycle_length);
        let luteal = cycles::average_luteal_phase(shift, periods, &self.settings);

        let offset = average_cycle_length.round() as i64 - luteal.round() as i64;
        let confidence = stats
            .and_then(|s| s.regularity_score)
            .map(|score| score.max(MIN_CYCLE_CONFIDENCE))
            .unwrap_or(MIN_CYCLE_CONFIDENCE);

        Some(MethodEstimate {
            ovulation_date: last_start + Duration::days(offset),
            confidence,
        })
    }
}

/// Merge the two estimators' answers into one prediction.
///
/// A single answer is used as-is. Two answers at most 3 days apart become
/// their confidence-weighted midpoint with a small agreement bonus. Two
/// clearly divergent answers resolve to the more confident one, unmodified.
pub fn combine_estimates(
    temperature: Option<MethodEstimate>,
    cycle: Option<MethodEstimate>,
) -> Prediction {
    match (temperature, cycle) {
        (None, None) => Prediction::Unavailable {
            reason: "neither enough temperature readings nor enough period history \
                     to estimate ovulation"
                .into(),
        },
        (Some(t), None) => Prediction::Predicted(OvulationPrediction::new(
            t.ovulation_date,
            t.confidence,
            PredictionMethod::Temperature,
        )),
        (None, Some(c)) => Prediction::Predicted(OvulationPrediction::new(
            c.ovulation_date,
            c.confidence,
            PredictionMethod::Cycle,
        )),
        (Some(t), Some(c)) => {
            let gap = (t.ovulation_date - c.ovulation_date).num_days().abs();
            if gap <= MAX_COMBINE_GAP_DAYS {
                let date = weighted_midpoint(t, c);
                let confidence = ((t.confidence + c.confidence) / 2.0 + 0.1).min(1.0);
                Prediction::Predicted(OvulationPrediction::new(
                    date,
                    confidence,
                    PredictionMethod::Combined,
                ))
            } else if t.confidence >= c.confidence {
                Prediction::Predicted(OvulationPrediction::new(
                    t.ovulation_date,
                    t.confidence,
                    PredictionMethod::Temperature,
                ))
            } else {
                Prediction::Predicted(OvulationPrediction::new(
                    c.ovulation_date,
                    c.confidence,
                    PredictionMethod::Cycle,
                ))
            }
        }
    }
}

/// Confidence-weighted midpoint of two dates, on the day scale.
fn weighted_midpoint(a: MethodEstimate, b: MethodEstimate) -> NaiveDate {
    let a_days = a.ovulation_date.num_days_from_ce() as f64;
    let b_days = b.ovulation_date.num_days_from_ce() as f64;
    let total = a.confidence + b.confidence;
    let mid = (a_days * a.confidence + b_days * b.confidence) / total;
    NaiveDate::from_num_days_from_ce_opt(mid.round() as i32)
        .unwrap_or(a.ovulation_date)
}

/// Classify `today` against a predicted window.
pub fn fertility_status(window: &FertileWindow, today: NaiveDate) -> FertilityPhase {
    if today < window.fertile_start {
        FertilityPhase::PreFertile {
            days_until_window: (window.fertile_start - today).num_days(),
        }
    } else if today > window.fertile_end {
        FertilityPhase::PostFertile {
            days_since_window: (today - window.fertile_end).num_days(),
        }
    } else if today >= window.optimal_start && today <= window.optimal_end {
        FertilityPhase::Optimal {
            days_to_ovulation: (window.ovulation_date - today).num_days(),
        }
    } else {
        FertilityPhase::Fertile {
            days_to_ovulation: (window.ovulation_date - today).num_days(),
        }
    }
}
