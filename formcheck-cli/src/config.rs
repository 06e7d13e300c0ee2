//! Session configuration from the environment.

use std::str::FromStr;
use std::time::Duration;

use formcheck_lib::settings::MockSettings;
use log::LevelFilter;

pub const SUBMIT_DELAY_VAR: &str = "FORMCHECK_SUBMIT_DELAY_MS";
pub const ASYNC_DELAY_VAR: &str = "FORMCHECK_ASYNC_DELAY_MS";
pub const SUBMIT_ERRORS_VAR: &str = "FORMCHECK_SUBMIT_ERRORS";
pub const LOG_VAR: &str = "FORMCHECK_LOG";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a number of milliseconds, got '{value}'")]
    InvalidDelay { var: &'static str, value: String },

    #[error("{var} must be true or false, got '{value}'")]
    InvalidFlag { var: &'static str, value: String },

    #[error("{var} must be a log level, got '{value}'")]
    InvalidLevel { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub settings: MockSettings,
    pub log_level: LevelFilter,
}

impl CliConfig {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` to read variables. Unset variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = MockSettings::default();

        if let Some(value) = lookup(SUBMIT_DELAY_VAR) {
            settings.submit_delay = parse_delay(SUBMIT_DELAY_VAR, &value)?;
        }
        if let Some(value) = lookup(ASYNC_DELAY_VAR) {
            settings.async_validation_delay = parse_delay(ASYNC_DELAY_VAR, &value)?;
        }
        if let Some(value) = lookup(SUBMIT_ERRORS_VAR) {
            settings.submit_returns_errors = parse_flag(SUBMIT_ERRORS_VAR, &value)?;
        }

        let log_level = match lookup(LOG_VAR) {
            Some(value) => LevelFilter::from_str(value.trim()).map_err(|_| {
                ConfigError::InvalidLevel {
                    var: LOG_VAR,
                    value,
                }
            })?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            settings,
            log_level,
        })
    }
}

fn parse_delay(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDelay {
            var,
            value: value.to_string(),
        })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: value.to_string(),
        }),
    }
}
