//! Record orchestration: validated writes, cached reads, cycle maintenance.
//!
//! `DataManager` is the sole writer of the day-record map and the cycle
//! list. Every save validates first, then re-reads the full map from the
//! store, merges the one facet in memory, and writes the map back in a
//! single `set_item`, so concurrent saves to the same date merge at facet
//! granularity instead of clobbering whole days. An internal async lock
//! serializes those read-modify-write rounds. Cache entries for the touched
//! date (and any ranges covering it) are invalidated after the successful
//! write, before the call returns, so the very next read observes the new
//! value.
//!
//! Construct one per store and hand it around by reference; there is no
//! process-wide instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::TtlCache;
use crate::error::EngineError;
use crate::predictor::{OvulationPredictor, PredictionReport};
use crate::records::{
    DayRecord, IntercourseRecord, MenstrualCycle, MenstrualRecord, SymptomRecord,
    TemperatureRecord, UserSettings,
};
use crate::store::{CYCLES_KEY, DAY_RECORDS_KEY, RecordStore, StorageError, USER_SETTINGS_KEY};
use crate::traits::Clock;
use crate::validate;

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

const DAY_CACHE_PREFIX: &str = "day_record_";
const RANGE_CACHE_PREFIX: &str = "day_records_range_";

/// Engine tuning handed to [`DataManager::new`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache_ttl_secs: u64,
    /// Settings used until the user saves their own.
    pub default_settings: UserSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            default_settings: UserSettings::default(),
        }
    }
}

/// Which facet of a day a delete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFacet {
    Temperature,
    Menstrual,
    Intercourse,
    Symptoms,
}

/// Raw history slice feeding the analytics layer.
#[derive(Debug, Clone, Default)]
pub struct HistorySlice {
    pub temperatures: Vec<(NaiveDate, f64)>,
    pub menstrual: Vec<MenstrualRecord>,
}

type DayMap = BTreeMap<NaiveDate, DayRecord>;

/// Orchestrates the record store, the TTL cache and cycle bookkeeping.
pub struct DataManager {
    store: Arc<dyn RecordStore>,
    cache: TtlCache,
    defaults: UserSettings,
    /// Serializes read-modify-write rounds against the store.
    write_lock: tokio::sync::Mutex<()>,
}

impl DataManager {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            cache: TtlCache::new(Duration::seconds(config.cache_ttl_secs as i64), clock),
            defaults: config.default_settings,
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    // ==================== Save Operations ====================

    /// Save (or replace) the temperature reading for the record's date.
    pub async fn save_temperature_record(
        &self,
        record: TemperatureRecord,
    ) -> Result<(), EngineError> {
        validate::check_temperature_record(&record)?;

        let _guard = self.write_lock.lock().await;
        let mut map = self.load_day_map().await?;
        let date = record.date;
        map.entry(date)
            .or_insert_with(|| DayRecord::new(date))
            .temperature = Some(record);
        self.store_day_map(&map).await?;
        self.invalidate_date(date);
        debug!(%date, "saved temperature record");
        Ok(())
    }

    /// Save (or replace) the menstrual entry for the record's date, then run
    /// cycle maintenance when the record marks a boundary.
    pub async fn save_menstrual_record(&self, record: MenstrualRecord) -> Result<(), EngineError> {
        validate::check_menstrual_record(&record)?;

        {
            let _guard = self.write_lock.lock().await;
            let mut map = self.load_day_map().await?;
            map.entry(record.date)
                .or_insert_with(|| DayRecord::new(record.date))
                .menstrual = Some(record.clone());
            self.store_day_map(&map).await?;
            self.invalidate_date(record.date);
            debug!(date = %record.date, flow = record.flow.as_str(), "saved menstrual record");
        }

        // Second pipeline step, separately retryable: the record is durable
        // even if this fails and the caller re-runs it.
        self.update_cycles(&record).await
    }

    /// Append an intercourse event. The manager assigns the id (replacing
    /// whatever the caller set) and returns it as the deletion handle.
    pub async fn save_intercourse_record(
        &self,
        mut record: IntercourseRecord,
    ) -> Result<Uuid, EngineError> {
        validate::check_intercourse_record(&record)?;
        record.id = Uuid::new_v4();
        let id = record.id;

        let _guard = self.write_lock.lock().await;
        let mut map = self.load_day_map().await?;
        let date = record.date;
        let day = map.entry(date).or_insert_with(|| DayRecord::new(date));
        day.intercourse.push(record);
        day.no_intercourse = false;
        self.store_day_map(&map).await?;
        self.invalidate_date(date);
        debug!(%date, "saved intercourse record");
        Ok(id)
    }

    /// Mark a date as explicitly intercourse-free, clearing any events
    /// logged for it.
    pub async fn save_no_intercourse_record(&self, date: NaiveDate) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_day_map().await?;
        let day = map.entry(date).or_insert_with(|| DayRecord::new(date));
        day.intercourse.clear();
        day.no_intercourse = true;
        self.store_day_map(&map).await?;
        self.invalidate_date(date);
        debug!(%date, "marked day as no-intercourse");
        Ok(())
    }

    /// Save (or replace) the symptom tags for the record's date.
    pub async fn save_symptom_record(&self, record: SymptomRecord) -> Result<(), EngineError> {
        validate::check_symptom_record(&record)?;

        let _guard = self.write_lock.lock().await;
        let mut map = self.load_day_map().await?;
        let date = record.date;
        map.entry(date)
            .or_insert_with(|| DayRecord::new(date))
            .symptoms = Some(record);
        self.store_day_map(&map).await?;
        self.invalidate_date(date);
        debug!(%date, "saved symptom record");
        Ok(())
    }

    // ==================== Read Operations ====================

    /// Fetch one day's record. Absence is cached too, so repeated misses on
    /// an empty date stay cheap.
    pub async fn get_day_record(&self, date: NaiveDate) -> Result<Option<DayRecord>, EngineError> {
        let key = day_cache_key(date);
        if let Some(value) = self.cache.get(&key) {
            debug!(%date, "day record cache hit");
            return Ok(decode_cached_day(value)?);
        }

        let map = self.load_day_map().await?;
        let record = map.get(&date).cloned();
        let cached = match &record {
            Some(r) => serde_json::to_value(r).map_err(StorageError::from)?,
            None => Value::Null,
        };
        self.cache.put(&key, cached);
        Ok(record)
    }

    /// Fetch every recorded day in the inclusive range, ascending. Sparse:
    /// dates without records do not appear.
    pub async fn get_day_records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayRecord>, EngineError> {
        if start > end {
            return Ok(Vec::new());
        }

        let key = range_cache_key(start, end);
        if let Some(value) = self.cache.get(&key) {
            debug!(%start, %end, "range cache hit");
            return Ok(serde_json::from_value(value).map_err(StorageError::from)?);
        }

        let map = self.load_day_map().await?;
        let records: Vec<DayRecord> = map.range(start..=end).map(|(_, r)| r.clone()).collect();
        self.cache
            .put(&key, serde_json::to_value(&records).map_err(StorageError::from)?);
        Ok(records)
    }

    /// Current cycle list, oldest first.
    pub async fn get_cycles(&self) -> Result<Vec<MenstrualCycle>, EngineError> {
        if let Some(value) = self.cache.get(CYCLES_KEY) {
            return Ok(serde_json::from_value(value).map_err(StorageError::from)?);
        }
        let cycles = self.load_cycles().await?;
        self.cache
            .put(CYCLES_KEY, serde_json::to_value(&cycles).map_err(StorageError::from)?);
        Ok(cycles)
    }

    /// User settings, falling back to the configured defaults when none were
    /// saved yet.
    pub async fn get_user_settings(&self) -> Result<UserSettings, EngineError> {
        if let Some(value) = self.cache.get(USER_SETTINGS_KEY) {
            return Ok(serde_json::from_value(value).map_err(StorageError::from)?);
        }
        let settings = match self.store.get_item(USER_SETTINGS_KEY).await? {
            Some(value) => serde_json::from_value(value).map_err(StorageError::from)?,
            None => self.defaults.clone(),
        };
        self.cache.put(
            USER_SETTINGS_KEY,
            serde_json::to_value(&settings).map_err(StorageError::from)?,
        );
        Ok(settings)
    }

    pub async fn save_user_settings(&self, settings: UserSettings) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        self.store
            .set_item(
                USER_SETTINGS_KEY,
                serde_json::to_value(&settings).map_err(StorageError::from)?,
            )
            .await?;
        self.cache.invalidate(USER_SETTINGS_KEY);
        Ok(())
    }

    // ==================== Delete ====================

    /// Remove one facet of a day; `record_id` selects a single intercourse
    /// event (without it the whole intercourse facet goes, marker included).
    /// Deleting from an absent date is a no-op. A day left without any facet
    /// is removed from the map entirely.
    pub async fn delete_record(
        &self,
        date: NaiveDate,
        facet: RecordFacet,
        record_id: Option<Uuid>,
    ) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load_day_map().await?;
        let Some(day) = map.get_mut(&date) else {
            return Ok(());
        };

        match facet {
            RecordFacet::Temperature => day.temperature = None,
            RecordFacet::Menstrual => day.menstrual = None,
            RecordFacet::Intercourse => match record_id {
                Some(id) => day.intercourse.retain(|r| r.id != id),
                None => {
                    day.intercourse.clear();
                    day.no_intercourse = false;
                }
            },
            RecordFacet::Symptoms => day.symptoms = None,
        }

        if day.is_empty() {
            map.remove(&date);
            debug!(%date, "removed emptied day record");
        }

        self.store_day_map(&map).await?;
        self.invalidate_date(date);
        Ok(())
    }

    // ==================== Cycle Maintenance ====================

    /// Apply a boundary record to the durable cycle list. Runs as its own
    /// step after the record itself is persisted; re-running it after a
    /// storage failure needs no re-validation of the record.
    pub async fn update_cycles(&self, record: &MenstrualRecord) -> Result<(), EngineError> {
        if !record.is_start && !record.is_end {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut cycles = self.load_cycles().await?;
        apply_boundary_event(&mut cycles, record);
        self.store
            .set_item(
                CYCLES_KEY,
                serde_json::to_value(&cycles).map_err(StorageError::from)?,
            )
            .await?;
        self.cache.invalidate(CYCLES_KEY);
        Ok(())
    }

    // ==================== Analytics Entry Points ====================

    /// Gather the raw temperature and menstrual history for a date range.
    pub async fn collect_history(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HistorySlice, EngineError> {
        let days = self.get_day_records_in_range(start, end).await?;
        let mut slice = HistorySlice::default();
        for day in days {
            if let Some(t) = day.temperature {
                slice.temperatures.push((t.date, t.temperature));
            }
            if let Some(m) = day.menstrual {
                slice.menstrual.push(m);
            }
        }
        Ok(slice)
    }

    /// Run the full prediction pipeline over a date range, using the stored
    /// user settings.
    pub async fn predict_ovulation(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PredictionReport, EngineError> {
        let settings = self.get_user_settings().await?;
        let history = self.collect_history(start, end).await?;
        let predictor = OvulationPredictor::new(settings);
        Ok(predictor.predict(&history.temperatures, &history.menstrual))
    }

    // ==================== Internals ====================

    async fn load_day_map(&self) -> Result<DayMap, StorageError> {
        match self.store.get_item(DAY_RECORDS_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(DayMap::new()),
        }
    }

    async fn store_day_map(&self, map: &DayMap) -> Result<(), StorageError> {
        self.store
            .set_item(DAY_RECORDS_KEY, serde_json::to_value(map)?)
            .await
    }

    async fn load_cycles(&self) -> Result<Vec<MenstrualCycle>, StorageError> {
        match self.store.get_item(CYCLES_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Drop the per-date entry and every cached range that covers the date.
    fn invalidate_date(&self, date: NaiveDate) {
        self.cache.invalidate(&day_cache_key(date));
        self.cache
            .invalidate_matching(|key| range_key_covers(key, date));
    }
}

fn day_cache_key(date: NaiveDate) -> String {
    format!("{DAY_CACHE_PREFIX}{date}")
}

fn range_cache_key(start: NaiveDate, end: NaiveDate) -> String {
    format!("{RANGE_CACHE_PREFIX}{start}_{end}")
}

/// Does a range cache key cover the given date?
fn range_key_covers(key: &str, date: NaiveDate) -> bool {
    let Some(rest) = key.strip_prefix(RANGE_CACHE_PREFIX) else {
        return false;
    };
    let Some((start, end)) = rest.split_once('_') else {
        return false;
    };
    match (
        NaiveDate::parse_from_str(start, "%Y-%m-%d"),
        NaiveDate::parse_from_str(end, "%Y-%m-%d"),
    ) {
        (Ok(start), Ok(end)) => start <= date && date <= end,
        _ => false,
    }
}

fn decode_cached_day(value: Value) -> Result<Option<DayRecord>, StorageError> {
    if value.is_null() {
        Ok(None)
    } else {
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Fold one boundary record into the cycle list.
///
/// `is_start` closes the currently open cycle the day before the new start
/// (making its length the start-to-start distance) and opens a new one.
/// `is_end` closes the most recent open cycle on the record's date; when a
/// second, earlier cycle is also still open it is closed at the newly closed
/// cycle's start boundary. Three or more simultaneously open cycles are not
/// repaired beyond that pair; the surplus is logged and left open rather
/// than guessing at boundaries.
pub fn apply_boundary_event(cycles: &mut Vec<MenstrualCycle>, record: &MenstrualRecord) {
    if record.is_start {
        if let Some(open) = cycles.iter_mut().rev().find(|c| !c.is_complete) {
            if open.start_date == record.date {
                // Same start saved again; the cycle is already open.
                return;
            }
            if open.start_date < record.date {
                open.close(record.date - Duration::days(1));
                info!(
                    start = %open.start_date,
                    length = open.length.unwrap_or(0),
                    "closed cycle at next cycle's start"
                );
            }
        }
        cycles.push(MenstrualCycle::open(record.date));
        cycles.sort_by_key(|c| c.start_date);
        info!(start = %record.date, "opened new cycle");
    } else if record.is_end {
        let open_count = cycles.iter().filter(|c| !c.is_complete).count();
        if open_count == 0 {
            warn!(date = %record.date, "period end recorded with no open cycle");
            return;
        }
        if open_count > 2 {
            warn!(
                open = open_count,
                "more than two open cycles; repairing the most recent pair only"
            );
        }

        let latest_idx = cycles
            .iter()
            .rposition(|c| !c.is_complete)
            .expect("open_count > 0");
        let latest_start = cycles[latest_idx].start_date;
        cycles[latest_idx].close(record.date);
        info!(start = %latest_start, end = %record.date, "closed cycle at period end");

        if let Some(earlier) = cycles[..latest_idx].iter_mut().rev().find(|c| !c.is_complete) {
            earlier.close(latest_start - Duration::days(1));
            info!(
                start = %earlier.start_date,
                "closed earlier open cycle at the newer cycle's start"
            );
        }
    }
}
