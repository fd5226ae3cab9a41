//! Record types for the fertility engine.
//!
//! One `DayRecord` aggregates everything logged for a single calendar date.
//! The per-day map stored under the `day_records` key is the single source of
//! truth; every facet is an explicit `Option`/`Vec` so that "absent" and
//! "invalid" are different things at the type level.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Basal body temperature measurement for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    pub date: NaiveDate,
    /// Time of measurement (basal temperature is taken on waking).
    pub time: NaiveTime,
    /// Degrees Celsius, one decimal nominal. Valid range 35.0..=42.0.
    pub temperature: f64,
    pub note: Option<String>,
}

/// Menstrual flow intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowLevel {
    None,
    Light,
    Medium,
    Heavy,
}

impl FlowLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowLevel::None => "none",
            FlowLevel::Light => "light",
            FlowLevel::Medium => "medium",
            FlowLevel::Heavy => "heavy",
        }
    }

    /// True when the day actually bled (counts toward a period).
    pub fn is_flow(&self) -> bool {
        !matches!(self, FlowLevel::None)
    }
}

impl std::str::FromStr for FlowLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(FlowLevel::None),
            "light" => Ok(FlowLevel::Light),
            "medium" => Ok(FlowLevel::Medium),
            "heavy" => Ok(FlowLevel::Heavy),
            other => Err(format!(
                "unknown flow level '{other}' (expected none, light, medium or heavy)"
            )),
        }
    }
}

/// Menstrual flow entry for one day.
///
/// `is_start`/`is_end` mark cycle boundaries; a single record must not claim
/// both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenstrualRecord {
    pub date: NaiveDate,
    pub flow: FlowLevel,
    pub is_start: bool,
    pub is_end: bool,
}

/// One intercourse event; a day may hold several, ordered by insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntercourseRecord {
    /// Deletion handle, assigned by the manager on save.
    pub id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub protected: bool,
    pub note: Option<String>,
}

/// Free-form symptom tags logged for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomRecord {
    pub date: NaiveDate,
    pub symptoms: Vec<String>,
    pub note: Option<String>,
}

/// Aggregate of everything logged for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menstrual: Option<MenstrualRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub intercourse: Vec<IntercourseRecord>,
    /// Explicit "no intercourse today" marker. Mutually exclusive with a
    /// non-empty intercourse list.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_intercourse: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<SymptomRecord>,
}

impl DayRecord {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            temperature: None,
            menstrual: None,
            intercourse: Vec::new(),
            no_intercourse: false,
            symptoms: None,
        }
    }

    /// A day with no facets must not be kept in the store.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.menstrual.is_none()
            && self.intercourse.is_empty()
            && !self.no_intercourse
            && self.symptoms.is_none()
    }
}

/// One menstrual cycle, opened by an `is_start` record.
///
/// `length` is an inclusive day count. A cycle closed by the next cycle's
/// start gets `end_date = next_start - 1 day`, so its length equals the
/// start-to-start distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenstrualCycle {
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    pub is_complete: bool,
}

impl MenstrualCycle {
    pub fn open(start_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date: None,
            length: None,
            is_complete: false,
        }
    }

    /// Close the cycle at `end_date` (inclusive).
    pub fn close(&mut self, end_date: NaiveDate) {
        self.end_date = Some(end_date);
        self.length = Some((end_date - self.start_date).num_days() + 1);
        self.is_complete = true;
    }
}

/// Personal parameters that bias predictions when history is sparse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub average_cycle_length: f64,
    pub average_luteal_phase: f64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            average_cycle_length: 28.0,
            average_luteal_phase: 14.0,
        }
    }
}
