//! Configuration management for qualitycheck.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "qualitycheck";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "checklists.db";

/// Default CSV store file name.
const CSV_FILE_NAME: &str = "checklists.csv";

/// Largest UTC offset chrono accepts, in minutes (exclusive).
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `QUALITYCHECK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/qualitycheck/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Checklist configuration.
    pub checklist: ChecklistConfig,
    /// Identity directory.
    pub identity: IdentityConfig,
    /// Locale configuration.
    pub locale: LocaleConfig,
}

/// Which row store backs the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Ephemeral in-process table, lost when the process exits.
    Memory,
    /// Flat CSV file.
    Csv,
    /// `SQLite` table with photos stored inline as base64.
    #[default]
    Sqlite,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Csv => write!(f, "csv"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend used to persist checklist rows.
    pub backend: Backend,
    /// Path to the database file.
    /// Defaults to `~/.local/share/qualitycheck/checklists.db`
    pub database_path: Option<PathBuf>,
    /// Path to the CSV store.
    /// Defaults to `~/.local/share/qualitycheck/checklists.csv`
    pub csv_path: Option<PathBuf>,
    /// Attempts made for a storage operation before giving up.
    pub retry_attempts: u32,
    /// Initial delay between retries in milliseconds; doubles on each retry.
    pub retry_backoff_ms: u64,
}

/// When a label photo must accompany a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoPolicy {
    /// Every submission, including reinspections.
    Always,
    /// First-time inspections only.
    #[default]
    FirstInspection,
    /// Never required.
    Never,
}

impl PhotoPolicy {
    /// Whether a submission of the given kind needs a photo.
    #[must_use]
    pub fn requires_photo(self, is_reinspection: bool) -> bool {
        match self {
            Self::Always => true,
            Self::FirstInspection => !is_reinspection,
            Self::Never => false,
        }
    }
}

/// Checklist-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    /// Inspection points, in display order.
    pub items: Vec<String>,
    /// The item whose row carries the label photo.
    pub photo_item: String,
    /// When the photo is mandatory.
    pub photo_policy: PhotoPolicy,
    /// Optional regex every serial number must match.
    pub serial_pattern: Option<String>,
}

/// Static username to password directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Known inspectors and their passwords.
    #[serde(skip_serializing)]
    pub users: BTreeMap<String, String>,
}

/// Locale-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Fixed offset from UTC, in minutes, used to stamp submissions.
    pub utc_offset_minutes: i32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            database_path: None, // Will be resolved to default at runtime
            csv_path: None,
            retry_attempts: 3,
            retry_backoff_ms: 50,
        }
    }
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            items: default_items(),
            photo_item: "Label".to_string(),
            photo_policy: PhotoPolicy::FirstInspection,
            serial_pattern: None,
        }
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        // UTC-3, the plant's local time
        Self {
            utc_offset_minutes: -180,
        }
    }
}

/// Default inspection points.
fn default_items() -> Vec<String> {
    vec![
        "Label".to_string(),
        "Drum + Screw".to_string(),
        "Solder".to_string(),
        "Paint".to_string(),
        "ABS Rubber".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `QUALITYCHECK_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("QUALITYCHECK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let checklist = &self.checklist;

        if checklist.items.is_empty() {
            return Err(Error::ConfigValidation {
                message: "checklist must name at least one item".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for item in &checklist.items {
            if item.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "checklist item names cannot be blank".to_string(),
                });
            }
            if !seen.insert(item.as_str()) {
                return Err(Error::ConfigValidation {
                    message: format!("checklist item '{item}' is listed twice"),
                });
            }
        }

        if checklist.photo_policy != PhotoPolicy::Never
            && !checklist.items.contains(&checklist.photo_item)
        {
            return Err(Error::ConfigValidation {
                message: format!(
                    "photo_item '{}' is not one of the checklist items",
                    checklist.photo_item
                ),
            });
        }

        if let Some(pattern) = &checklist.serial_pattern {
            if regex::Regex::new(pattern).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("invalid regex pattern: {pattern}"),
                });
            }
        }

        if self.locale.utc_offset_minutes.abs() >= MAX_OFFSET_MINUTES {
            return Err(Error::ConfigValidation {
                message: format!(
                    "utc_offset_minutes ({}) must be within +/-{}",
                    self.locale.utc_offset_minutes,
                    MAX_OFFSET_MINUTES - 1
                ),
            });
        }

        if self.storage.retry_attempts == 0 {
            return Err(Error::ConfigValidation {
                message: "retry_attempts must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the CSV store path, resolving defaults if not set.
    #[must_use]
    pub fn csv_path(&self) -> PathBuf {
        self.storage
            .csv_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CSV_FILE_NAME))
    }

    /// Get the initial retry backoff as a Duration.
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.storage.retry_backoff_ms)
    }

    /// Get the fixed timezone submissions are stamped in.
    ///
    /// Falls back to UTC if the offset is out of range; `validate` rejects that case.
    #[must_use]
    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.locale.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }
}
