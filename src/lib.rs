//! Cyclesense Library
//!
//! Fertility analytics engine: basal-temperature shift detection, menstrual
//! cycle statistics, combined ovulation prediction, and the validated,
//! cached record layer feeding them. The storage backend is pluggable via
//! [`store::RecordStore`]; UI and reporting layers are expected to talk to
//! [`manager::DataManager`] and [`predictor`] only.

pub mod cache;
pub mod config;
pub mod cycles;
pub mod error;
pub mod manager;
pub mod predictor;
pub mod records;
pub mod store;
pub mod temperature;
pub mod traits;
pub mod validate;

// Re-export commonly used types
pub use cache::TtlCache;
pub use config::AppConfig;
pub use cycles::{
    CycleAnalysis,
    CycleStats,
    Period,
    Regularity,
    analyze_cycles,
    average_luteal_phase,
    group_periods,
};
pub use error::{EngineError, ValidationErrors};
pub use manager::{
    DataManager,
    EngineConfig,
    HistorySlice,
    RecordFacet,
    apply_boundary_event,
};
pub use predictor::{
    FertileWindow,
    FertilityPhase,
    MethodEstimate,
    OvulationPrediction,
    OvulationPredictor,
    Prediction,
    PredictionMethod,
    PredictionReport,
    combine_estimates,
    fertility_status,
};
pub use records::{
    DayRecord,
    FlowLevel,
    IntercourseRecord,
    MenstrualCycle,
    MenstrualRecord,
    SymptomRecord,
    TemperatureRecord,
    UserSettings,
};
pub use store::{JsonFileStore, MemoryStore, RecordStore, StorageError};
pub use temperature::{
    ShiftConfidence,
    ShiftDetection,
    TemperatureShift,
    detect_temperature_shift,
    moving_average,
};
pub use traits::{Clock, MockClock, SystemClock};
pub use validate::{
    FieldCheck,
    validate_date,
    validate_menstrual_flow,
    validate_note,
    validate_temperature,
    validate_time,
};
