//! Configuration loading and compiled defaults
//!
//! Settings are resolved in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is not an error: the wizard logs a warning and
//! continues with compiled defaults. A config file that exists but cannot be
//! parsed is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const ENV_CONFIG_PATH: &str = "ETONGUE_CONFIG";

/// Environment variable overriding the backend base URL
pub const ENV_BASE_URL: &str = "ETONGUE_BASE_URL";

/// Environment variable naming the persisted profile file
pub const ENV_PROFILE_PATH: &str = "ETONGUE_PROFILE";

/// Application directory name under the platform config dir
pub const APP_DIR_NAME: &str = "etongue";

/// Wizard configuration loaded from TOML
///
/// Every field is optional; anything left out falls back to
/// [`CompiledDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Backend origin, e.g. `http://localhost:8000`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Location of the persisted factory/medicine profile
    #[serde(default)]
    pub profile_path: Option<PathBuf>,

    /// Polling and request timing
    #[serde(default)]
    pub timing: TimingConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timing section of the config file. Durations are in seconds and may be
/// fractional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default)]
    pub poll_interval_secs: Option<f64>,
    #[serde(default)]
    pub prediction_delay_secs: Option<f64>,
    #[serde(default)]
    pub prediction_attempts: Option<u32>,
    #[serde(default)]
    pub request_timeout_secs: Option<f64>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Built-in defaults used when neither CLI, environment nor TOML provide a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub base_url: String,
    pub poll_interval_secs: f64,
    pub prediction_delay_secs: f64,
    pub prediction_attempts: u32,
    pub request_timeout_secs: f64,
    pub log_level: String,
    pub config_path: Option<PathBuf>,
    pub profile_path: PathBuf,
}

impl CompiledDefaults {
    /// Defaults for the platform the binary runs on
    pub fn for_current_platform() -> Self {
        let app_dir = dirs::config_dir()
            .map(|d| d.join(APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR_NAME));

        Self {
            base_url: "http://localhost:8000".to_string(),
            poll_interval_secs: 15.0,
            prediction_delay_secs: 15.0,
            prediction_attempts: 1,
            request_timeout_secs: 30.0,
            log_level: default_log_level(),
            config_path: Some(app_dir.join("config.toml")),
            profile_path: app_dir.join(crate::profile::PROFILE_FILE_NAME),
        }
    }
}

/// Resolve which config file to read
///
/// **Priority:** CLI → `ETONGUE_CONFIG` → platform default
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    CompiledDefaults::for_current_platform().config_path
}

/// Load the TOML config, degrading to defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Serialize `value` as TOML and write it to `path`
///
/// Writes to a sibling temp file first and renames it into place so readers
/// never observe a half-written file. Parent directories are created.
pub fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("Not a file path: {}", path.display())))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
