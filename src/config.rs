use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::manager::{DEFAULT_CACHE_TTL_SECS, EngineConfig};
use crate::records::UserSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory for the JSON file store.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// Seed values for user settings until the user saves their own.
#[derive(Debug, Deserialize, Clone)]
pub struct DefaultsConfig {
    pub average_cycle_length: f64,
    pub average_luteal_phase: f64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        let settings = UserSettings::default();
        Self {
            average_cycle_length: settings.average_cycle_length,
            average_luteal_phase: settings.average_luteal_phase,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cyclesense")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cyclesense");

        let builder = Config::builder()
            // 1. Load default values
            .set_default(
                "storage.data_dir",
                default_data_dir().to_string_lossy().to_string(),
            )?
            .set_default("cache.ttl_secs", DEFAULT_CACHE_TTL_SECS)?
            .set_default("defaults.average_cycle_length", 28.0)?
            .set_default("defaults.average_luteal_phase", 14.0)?
            // 2. Load from local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. Load from user config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Load from environment variables (CYCLESENSE__CACHE__TTL_SECS=...)
            .add_source(Environment::with_prefix("CYCLESENSE").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }

    /// Engine tuning derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache_ttl_secs: self.cache.ttl_secs,
            default_settings: UserSettings {
                average_cycle_length: self.defaults.average_cycle_length,
                average_luteal_phase: self.defaults.average_luteal_phase,
            },
        }
    }
}
