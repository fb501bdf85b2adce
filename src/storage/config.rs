//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory; a missing file
//! yields defaults.

use crate::clock::DayZone;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Local store settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Background sync settings
    #[serde(default)]
    pub sync: SyncSettings,
    /// Calendar-day settings for daily caps and streaks
    #[serde(default)]
    pub calendar: CalendarSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            storage: StorageSettings::default(),
            sync: SyncSettings::default(),
            calendar: CalendarSettings::default(),
        }
    }
}

impl AppConfig {
    /// Full path of the local database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.database_file)
    }
}

/// Local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file name inside the data directory
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "tinysteps.db".to_string(),
        }
    }
}

/// Background sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Seconds between timer-triggered passes
    pub interval_secs: u64,
    /// Entries kept in the rolling sync error log
    pub error_log_capacity: usize,
    /// Media blobs uploaded per pass
    pub media_batch_size: usize,
    /// Base URL of the remote record store
    pub remote_url: Option<String>,
    /// Base URL of the media store
    pub media_url: Option<String>,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            error_log_capacity: 20,
            media_batch_size: 5,
            remote_url: None,
            media_url: None,
            request_timeout_secs: 15,
        }
    }
}

impl SyncSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Calendar-day settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarSettings {
    /// Fixed UTC offset in minutes; the device time zone when unset
    pub utc_offset_minutes: Option<i32>,
}

impl CalendarSettings {
    /// Zone used for day boundaries.
    pub fn zone(&self) -> Result<DayZone, ConfigError> {
        match self.utc_offset_minutes {
            None => Ok(DayZone::Local),
            Some(minutes) => DayZone::from_offset_minutes(minutes).ok_or_else(|| {
                ConfigError::InvalidValue(format!("utc_offset_minutes out of range: {}", minutes))
            }),
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "tinysteps", "TinySteps")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path(), get_data_dir())
}

/// Load configuration from `path`, resolving data files under `data_dir`.
pub fn load_config_from(path: &std::path::Path, data_dir: PathBuf) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig {
            data_dir,
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.calendar.zone()?;
    config.data_dir = data_dir;

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to `path`.
pub fn save_config_to(config: &AppConfig, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
