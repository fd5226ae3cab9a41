//! End-to-end prediction tests: records go in through the manager, the
//! prediction pipeline reads them back out.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use cyclesense::{
    Clock, DataManager, EngineConfig, FertilityPhase, FlowLevel, MemoryStore, MenstrualRecord,
    MockClock, Prediction, PredictionMethod, ShiftConfidence, ShiftDetection, TemperatureRecord,
    fertility_status,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup() -> (DataManager, MockClock) {
    let clock = MockClock::new(Utc.with_ymd_and_hms(2025, 1, 20, 8, 0, 0).unwrap());
    let manager = DataManager::new(
        Arc::new(MemoryStore::new()),
        Arc::new(clock.clone()),
        EngineConfig::default(),
    );
    (manager, clock)
}

async fn log_temps(manager: &DataManager, start: NaiveDate, temps: &[f64]) {
    for (i, &t) in temps.iter().enumerate() {
        manager
            .save_temperature_record(TemperatureRecord {
                date: start + Duration::days(i as i64),
                time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
                temperature: t,
                note: None,
            })
            .await
            .unwrap();
    }
}

async fn log_period(manager: &DataManager, start: NaiveDate, days: i64) {
    for i in 0..days {
        manager
            .save_menstrual_record(MenstrualRecord {
                date: start + Duration::days(i),
                flow: FlowLevel::Medium,
                is_start: i == 0,
                is_end: false,
            })
            .await
            .unwrap();
    }
}

const BIPHASIC: [f64; 10] = [
    36.3, 36.2, 36.4, 36.3, 36.2, 36.7, 36.8, 36.9, 36.8, 36.7,
];

// ==================== Temperature Method ====================

#[tokio::test]
async fn test_temperature_only_prediction_matches_reference_curve() {
    let (manager, _clock) = setup();
    log_temps(&manager, date(2025, 1, 1), &BIPHASIC).await;

    let report = manager
        .predict_ovulation(date(2025, 1, 1), date(2025, 1, 31))
        .await
        .unwrap();

    let shift = match &report.shift {
        ShiftDetection::Detected(shift) => shift,
        other => panic!("expected a detected shift, got {other:?}"),
    };
    assert_eq!(shift.shift_date, date(2025, 1, 6));
    assert_eq!(shift.cover_line, Some(36.5));
    assert!(shift.confidence >= ShiftConfidence::Medium);

    let prediction = report.prediction.predicted().unwrap();
    assert_eq!(prediction.method, PredictionMethod::Temperature);
    assert_eq!(prediction.ovulation_date, date(2025, 1, 5));
}

// ==================== Combined Method ====================

#[tokio::test]
async fn test_agreeing_methods_combine() {
    let (manager, _clock) = setup();

    // Period history: starts Dec 1 and Dec 29: one 28-day cycle. The cycle
    // method projects ovulation to Dec 29 + 28 - 14 = Jan 12.
    log_period(&manager, date(2024, 12, 1), 4).await;
    log_period(&manager, date(2024, 12, 29), 4).await;

    // Temperature curve: 6 low days Jan 7-12, high from Jan 13: shift on
    // Jan 13, ovulation Jan 12. Both methods land on the same date.
    log_temps(
        &manager,
        date(2025, 1, 7),
        &[36.3, 36.2, 36.4, 36.3, 36.2, 36.3, 36.8, 36.9, 36.8],
    )
    .await;

    let report = manager
        .predict_ovulation(date(2024, 12, 1), date(2025, 1, 20))
        .await
        .unwrap();

    let prediction = report.prediction.predicted().unwrap();
    assert_eq!(prediction.method, PredictionMethod::Combined);
    assert_eq!(prediction.ovulation_date, date(2025, 1, 12));
    // Temperature rates High (0.8), cycle sits on its 0.3 floor:
    // combined = avg + 0.1 = 0.65.
    assert!((prediction.confidence - 0.65).abs() < 1e-9);
}

#[tokio::test]
async fn test_prediction_window_and_status() {
    let (manager, clock) = setup();
    log_temps(&manager, date(2025, 1, 1), &BIPHASIC).await;

    let report = manager
        .predict_ovulation(date(2025, 1, 1), date(2025, 1, 31))
        .await
        .unwrap();
    let prediction = report.prediction.predicted().unwrap();

    // Ovulation Jan 5: fertile Dec 31-Jan 6, optimal Jan 3-5.
    assert_eq!(prediction.window.fertile_start, date(2024, 12, 31));
    assert_eq!(prediction.window.fertile_end, date(2025, 1, 6));
    assert_eq!(prediction.window.optimal_start, date(2025, 1, 3));
    assert_eq!(prediction.window.optimal_end, date(2025, 1, 5));

    // The mock clock says Jan 20: two weeks past the window.
    match fertility_status(&prediction.window, clock.today()) {
        FertilityPhase::PostFertile { days_since_window } => {
            assert_eq!(days_since_window, 14);
        }
        other => panic!("expected post-fertile, got {other:?}"),
    }

    clock.set_time(Utc.with_ymd_and_hms(2025, 1, 4, 8, 0, 0).unwrap());
    assert!(matches!(
        fertility_status(&prediction.window, clock.today()),
        FertilityPhase::Optimal { days_to_ovulation: 1 }
    ));
}

// ==================== Insufficient Data ====================

#[tokio::test]
async fn test_empty_history_is_unavailable_not_an_error() {
    let (manager, _clock) = setup();
    let report = manager
        .predict_ovulation(date(2025, 1, 1), date(2025, 1, 31))
        .await
        .unwrap();

    match &report.prediction {
        Prediction::Unavailable { reason } => assert!(!reason.is_empty()),
        other => panic!("expected Unavailable, got {other:?}"),
    }
    assert!(matches!(
        report.shift,
        ShiftDetection::Insufficient { .. }
    ));
}

#[tokio::test]
async fn test_too_few_temperatures_reports_reason() {
    let (manager, _clock) = setup();
    log_temps(&manager, date(2025, 1, 1), &BIPHASIC[..7]).await;

    let report = manager
        .predict_ovulation(date(2025, 1, 1), date(2025, 1, 31))
        .await
        .unwrap();

    match &report.shift {
        ShiftDetection::Insufficient { reason } => {
            assert!(reason.contains("have 7"), "reason: {reason}");
        }
        other => panic!("expected Insufficient, got {other:?}"),
    }
    // No period history either, so the whole prediction is unavailable.
    assert!(matches!(report.prediction, Prediction::Unavailable { .. }));
}

#[tokio::test]
async fn test_single_period_still_predicts_from_settings() {
    let (manager, _clock) = setup();
    log_period(&manager, date(2025, 1, 1), 5).await;

    let report = manager
        .predict_ovulation(date(2024, 12, 1), date(2025, 1, 31))
        .await
        .unwrap();

    let prediction = report.prediction.predicted().unwrap();
    assert_eq!(prediction.method, PredictionMethod::Cycle);
    // Defaults (28-day cycle, 14-day luteal phase) put ovulation on Jan 15.
    assert_eq!(prediction.ovulation_date, date(2025, 1, 15));
    assert_eq!(prediction.confidence, 0.3);
    assert_eq!(prediction.confidence_label(), "low");
}

// ==================== Range Scoping ====================

#[tokio::test]
async fn test_prediction_only_sees_requested_range() {
    let (manager, _clock) = setup();
    log_temps(&manager, date(2025, 1, 1), &BIPHASIC).await;

    // Query a window that misses most of the readings.
    let report = manager
        .predict_ovulation(date(2025, 1, 8), date(2025, 1, 31))
        .await
        .unwrap();
    assert!(matches!(
        report.shift,
        ShiftDetection::Insufficient { .. }
    ));
}
