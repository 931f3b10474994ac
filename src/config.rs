//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ReceiverError, Result};
use crate::payload::protocol::PayloadEncoding;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub radio: RadioConfig,

    #[serde(default)]
    pub receiver: ReceiverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Radio dongle configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    /// Serial device; empty means auto-detect
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Receive pipeline configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverConfig {
    #[serde(default = "default_encoding")]
    pub encoding: PayloadEncoding,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_status_interval_s")]
    pub status_interval_s: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily-rolling log file; empty disables it
    #[serde(default)]
    pub file_dir: String,
}

// Default value functions
fn default_baud_rate() -> u32 { 115200 }

fn default_encoding() -> PayloadEncoding { PayloadEncoding::BinaryTelemetry }
fn default_poll_interval_ms() -> u64 { 50 }
fn default_status_interval_s() -> u64 { 30 }

fn default_log_level() -> String { "info".to_string() }

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            poll_interval_ms: default_poll_interval_ms(),
            status_interval_s: default_status_interval_s(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: String::new(),
        }
    }
}

/// Supported dongle baud rates
const VALID_BAUD_RATES: &[u32] = &[9600, 57600, 115200, 230400, 460800, 921600];

/// Supported log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use telemetry_rx::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if !VALID_BAUD_RATES.contains(&self.radio.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.receiver.poll_interval_ms == 0 || self.receiver.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.receiver.status_interval_s == 0 {
            return Err(invalid("status_interval_s must be greater than 0"));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ReceiverError {
    ReceiverError::Config(toml::de::Error::custom(msg))
}
