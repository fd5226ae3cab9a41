//! Field-level validation.
//!
//! Pure functions, no I/O. The string-based checks (`validate_date`,
//! `validate_time`, `validate_menstrual_flow`) are the contract offered to
//! input layers that still hold raw text; the `check_*` helpers are what the
//! manager runs against typed records before any write.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use crate::error::ValidationErrors;
use crate::records::{FlowLevel, IntercourseRecord, MenstrualRecord, SymptomRecord, TemperatureRecord};

/// Lowest plausible basal body temperature in °C.
pub const MIN_TEMPERATURE: f64 = 35.0;
/// Highest plausible basal body temperature in °C.
pub const MAX_TEMPERATURE: f64 = 42.0;
/// Notes longer than this are rejected.
pub const MAX_NOTE_LENGTH: usize = 500;

/// Outcome of a single field check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub valid: bool,
    pub message: Option<String>,
}

impl FieldCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
        }
    }
}

/// Check an ISO `YYYY-MM-DD` calendar date.
pub fn validate_date(value: &str) -> FieldCheck {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(_) => FieldCheck::ok(),
        Err(_) => FieldCheck::fail(format!("'{value}' is not a valid date (expected YYYY-MM-DD)")),
    }
}

/// Check a 24h `HH:MM` time of day.
pub fn validate_time(value: &str) -> FieldCheck {
    match NaiveTime::parse_from_str(value, "%H:%M") {
        Ok(_) => FieldCheck::ok(),
        Err(_) => FieldCheck::fail(format!("'{value}' is not a valid time (expected HH:MM)")),
    }
}

/// Check a temperature value against the plausible basal range.
///
/// Both boundary values are accepted.
pub fn validate_temperature(value: f64) -> FieldCheck {
    if !value.is_finite() {
        return FieldCheck::fail("temperature must be a finite number");
    }
    if (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        FieldCheck::ok()
    } else {
        FieldCheck::fail(format!(
            "temperature {value:.1} °C is outside the valid range {MIN_TEMPERATURE:.1}-{MAX_TEMPERATURE:.1} °C"
        ))
    }
}

/// Check a textual flow level against the known enum values.
pub fn validate_menstrual_flow(value: &str) -> FieldCheck {
    match FlowLevel::from_str(value) {
        Ok(_) => FieldCheck::ok(),
        Err(message) => FieldCheck::fail(message),
    }
}

/// Check an optional free-text note. Absent notes are valid.
pub fn validate_note(value: Option<&str>) -> FieldCheck {
    match value {
        None => FieldCheck::ok(),
        Some(note) if note.chars().count() <= MAX_NOTE_LENGTH => FieldCheck::ok(),
        Some(_) => FieldCheck::fail(format!("note exceeds {MAX_NOTE_LENGTH} characters")),
    }
}

fn apply(errors: &mut ValidationErrors, field: &str, check: FieldCheck) {
    if !check.valid {
        errors.push(field, check.message.unwrap_or_else(|| "invalid".into()));
    }
}

/// Validate a temperature record before saving.
pub fn check_temperature_record(record: &TemperatureRecord) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    apply(&mut errors, "temperature", validate_temperature(record.temperature));
    apply(&mut errors, "note", validate_note(record.note.as_deref()));
    errors.into_result()
}

/// Validate a menstrual record before saving.
pub fn check_menstrual_record(record: &MenstrualRecord) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if record.is_start && record.is_end {
        errors.push(
            "is_start",
            "a record cannot mark both the start and the end of a period",
        );
    }
    errors.into_result()
}

/// Validate an intercourse record before saving.
pub fn check_intercourse_record(record: &IntercourseRecord) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    apply(&mut errors, "note", validate_note(record.note.as_deref()));
    errors.into_result()
}

/// Validate a symptom record before saving.
pub fn check_symptom_record(record: &SymptomRecord) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if record.symptoms.is_empty() {
        errors.push("symptoms", "at least one symptom is required");
    }
    if record.symptoms.iter().any(|s| s.trim().is_empty()) {
        errors.push("symptoms", "symptom names must not be blank");
    }
    apply(&mut errors, "note", validate_note(record.note.as_deref()));
    errors.into_result()
}
