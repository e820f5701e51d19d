//! Configuration for the classification agent.

use crate::core::policy::default_sentinels;
use crate::sink::DisplayStyle;
use crate::source::SerialSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "serial-class-agent";

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device path or name
    pub port: String,

    /// Serial link rate
    pub baud_rate: u32,

    /// How long a single device read may block
    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,

    /// Length of each aggregation window
    #[serde(with = "duration_ms")]
    pub window_duration: Duration,

    /// Longest single wait for a line inside a window
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    /// Wait after opening the port before reading
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,

    /// Classification log (one label per line)
    pub log_path: PathBuf,

    /// Path for storing session statistics
    pub data_path: PathBuf,

    /// Labels that are shown but never logged, with their display style
    pub sentinels: BTreeMap<String, DisplayStyle>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            port: default_port().to_string(),
            baud_rate: 2_000_000,
            read_timeout: Duration::from_millis(100),
            window_duration: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            settle_delay: Duration::from_secs(2),
            log_path: PathBuf::from("output.txt"),
            data_path: data_dir,
            sentinels: default_sentinels(),
        }
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else {
        "/dev/ttyACM0"
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Where the last session's statistics are written.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("last_session.json")
    }

    /// Settings for opening the serial device.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
            settle_delay: self.settle_delay,
        }
    }

    /// Reject settings the cycle driver cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_duration.is_zero() {
            return Err(ConfigError::Invalid("window duration must be positive".into()));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::Invalid("read timeout must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll interval must be positive".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud rate must be positive".into()));
        }
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid("serial port must be set".into()));
        }
        if self.sentinels.keys().any(|label| label.trim().is_empty()) {
            return Err(ConfigError::Invalid("sentinel labels must not be empty".into()));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
