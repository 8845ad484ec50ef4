//! Settings resolution for etongue-wizard
//!
//! Provides multi-tier resolution with CLI → ENV → TOML → compiled default
//! priority for every setting the orchestrator needs.

use etongue_common::config::{
    CompiledDefaults, TomlConfig, ENV_BASE_URL, ENV_PROFILE_PATH,
};
use etongue_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Timers and limits used by the orchestrator phases
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSettings {
    /// Delay between collection poll cycles
    pub poll_interval: Duration,
    /// Delay between the predict-mode POST and the prediction fetch
    pub prediction_delay: Duration,
    /// Prediction fetch attempts (1 = single delayed fetch)
    pub prediction_attempts: u32,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            poll_interval: Duration::from_secs_f64(defaults.poll_interval_secs),
            prediction_delay: Duration::from_secs_f64(defaults.prediction_delay_secs),
            prediction_attempts: defaults.prediction_attempts,
            request_timeout: Duration::from_secs_f64(defaults.request_timeout_secs),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub base_url: Option<String>,
    pub profile_path: Option<PathBuf>,
}

/// Fully resolved wizard settings
#[derive(Debug, Clone)]
pub struct WizardSettings {
    pub base_url: String,
    pub profile_path: PathBuf,
    pub log_level: String,
    pub timing: TimingSettings,
}

impl WizardSettings {
    /// Resolve settings from CLI overrides, environment and TOML
    pub fn resolve(overrides: SettingsOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let base_url = first_valid(
            "base_url",
            [
                ("command line", overrides.base_url),
                ("environment", env_value(ENV_BASE_URL)),
                ("TOML", toml_config.base_url.clone()),
            ],
        )
        .unwrap_or(defaults.base_url);
        validate_base_url(&base_url)?;

        let profile_path = overrides
            .profile_path
            .or_else(|| env_value(ENV_PROFILE_PATH).map(PathBuf::from))
            .or_else(|| toml_config.profile_path.clone())
            .unwrap_or(defaults.profile_path);

        let log_level = Some(toml_config.logging.level.trim())
            .filter(|level| is_valid_value(level))
            .map_or(defaults.log_level, str::to_string);

        let timing_config = &toml_config.timing;
        let timing = TimingSettings {
            poll_interval: seconds(
                "poll_interval_secs",
                timing_config.poll_interval_secs,
                defaults.poll_interval_secs,
            )?,
            prediction_delay: seconds(
                "prediction_delay_secs",
                timing_config.prediction_delay_secs,
                defaults.prediction_delay_secs,
            )?,
            prediction_attempts: match timing_config.prediction_attempts {
                Some(0) => {
                    return Err(Error::Config(
                        "prediction_attempts must be at least 1".to_string(),
                    ))
                }
                Some(n) => n,
                None => defaults.prediction_attempts,
            },
            request_timeout: seconds(
                "request_timeout_secs",
                timing_config.request_timeout_secs,
                defaults.request_timeout_secs,
            )?,
        };

        debug!(
            base_url = %base_url,
            profile = %profile_path.display(),
            poll_interval = ?timing.poll_interval,
            prediction_delay = ?timing.prediction_delay,
            "Settings resolved"
        );

        Ok(Self {
            base_url,
            profile_path,
            log_level,
            timing,
        })
    }
}

impl WizardSettings {
    /// `EnvFilter` directives for the resolved log level
    pub fn log_filter(&self) -> String {
        log_filter(&self.log_level)
    }
}

/// `EnvFilter` directives applying `level` to both wizard crates
pub fn log_filter(level: &str) -> String {
    format!("etongue_wizard={level},etongue_common={level}")
}

/// Non-empty, non-whitespace value
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_value(v))
}

fn first_valid<const N: usize>(
    setting: &str,
    sources: [(&str, Option<String>); N],
) -> Option<String> {
    let present: Vec<(&str, String)> = sources
        .into_iter()
        .filter_map(|(source, value)| value.filter(|v| is_valid_value(v)).map(|v| (source, v)))
        .collect();

    if present.len() > 1 {
        let names: Vec<&str> = present.iter().map(|(source, _)| *source).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            setting,
            names.join(", "),
            names[0]
        );
    }

    present.into_iter().next().map(|(_, value)| value.trim().to_string())
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| Error::Config(format!("Invalid base_url {:?}: {}", base_url, e)))?;
    match url.scheme() {
        "http" | "https" if !url.cannot_be_a_base() => Ok(()),
        scheme => Err(Error::Config(format!(
            "base_url must be an http(s) origin, got scheme {:?}",
            scheme
        ))),
    }
}

fn seconds(name: &str, configured: Option<f64>, default: f64) -> Result<Duration> {
    let value = configured.unwrap_or(default);
    if value <= 0.0 {
        return Err(Error::Config(format!("{} must be positive, got {}", name, value)));
    }
    Duration::try_from_secs_f64(value)
        .map_err(|e| Error::Config(format!("{} is out of range: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_values() {
        assert!(is_valid_value("x"));
        assert!(!is_valid_value(""));
        assert!(!is_valid_value("   "));
    }

    #[test]
    fn test_seconds_rejects_non_positive() {
        assert!(seconds("poll", Some(0.0), 15.0).is_err());
        assert!(seconds("poll", Some(-1.0), 15.0).is_err());
        assert!(seconds("poll", Some(f64::NAN), 15.0).is_err());
        assert_eq!(
            seconds("poll", Some(0.05), 15.0).unwrap(),
            Duration::from_millis(50)
        );
        assert_eq!(seconds("poll", None, 15.0).unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn test_base_url_validation() {
        assert!(validate_base_url("http://localhost:8000").is_ok());
        assert!(validate_base_url("https://api.example.com/etongue/").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("mailto:someone@example.com").is_err());
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn test_log_level_drives_filter() {
        let mut toml_config = TomlConfig::default();
        toml_config.logging.level = " debug ".to_string();
        let settings = WizardSettings::resolve(SettingsOverrides::default(), &toml_config).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.log_filter(), "etongue_wizard=debug,etongue_common=debug");

        toml_config.logging.level = String::new();
        let settings = WizardSettings::resolve(SettingsOverrides::default(), &toml_config).unwrap();
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_default_timing_is_fifteen_seconds() {
        let timing = TimingSettings::default();
        assert_eq!(timing.poll_interval, Duration::from_secs(15));
        assert_eq!(timing.prediction_delay, Duration::from_secs(15));
        assert_eq!(timing.prediction_attempts, 1);
    }
}
