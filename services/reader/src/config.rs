//! services/reader/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub session_file: PathBuf,
    pub log_level: Level,
    pub balance_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            session_file: PathBuf::from("./.reader-session.json"),
            log_level: Level::INFO,
            balance_channel_capacity: 16,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Backend Settings ---
        let api_base_url = match lookup("API_BASE_URL") {
            Some(raw) => normalize_base_url(&raw)?,
            None => defaults.api_base_url,
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue(
                        "REQUEST_TIMEOUT_SECS".to_string(),
                        "timeout must be at least one second".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        // --- Local Settings ---
        let session_file = lookup("SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_file);

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let balance_channel_capacity = match lookup("BALANCE_CHANNEL_CAPACITY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "BALANCE_CHANNEL_CAPACITY".to_string(),
                        format!("'{}' is not a positive integer", raw),
                    ))
                }
            },
            None => defaults.balance_channel_capacity,
        };

        Ok(Self {
            api_base_url,
            request_timeout,
            session_file,
            log_level,
            balance_channel_capacity,
        })
    }
}

/// Validates the base URL and strips any trailing slash so paths can be appended.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidValue(
            "API_BASE_URL".to_string(),
            format!("'{}' must start with http:// or https://", raw),
        ));
    }
    Ok(trimmed.to_string())
}
