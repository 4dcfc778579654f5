//! Configuration management for PulseSync.
//!
//! This module handles loading, saving, and managing PulseSync configuration.
//!
//! ## Configuration File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/pulsesync/config.toml` |
//! | macOS | `~/Library/Application Support/com.pulsesync.PulseSync/config.toml` |
//! | Windows | `%APPDATA%\PulseSync\PulseSync\config\config.toml` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use pulsesync_core::config::Config;
//!
//! let config = Config::load()?;
//! println!("Device name: {}", config.general.device_name);
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Main configuration struct for PulseSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Network settings
    pub network: NetworkConfig,
    /// Session timer settings
    pub session: SessionConfig,
    /// Heart-rate settings
    pub heart_rate: HeartRateConfig,
}

/// General configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Display name announced to the peer
    pub device_name: String,
    /// Stable identifier announced to the peer
    pub device_id: Uuid,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            device_name: hostname::get().map_or_else(
                |_| "PulseSync Device".to_string(),
                |h| h.to_string_lossy().to_string(),
            ),
            device_id: Uuid::new_v4(),
        }
    }
}

/// Network configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local UDP port
    pub port: u16,
    /// Address of the paired device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<SocketAddr>,
    /// Interval between presence announcements
    #[serde(with = "humantime_serde")]
    pub presence_interval: Duration,
    /// Silence after which the peer counts as unreachable
    #[serde(with = "humantime_serde")]
    pub reachability_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: crate::DEFAULT_PORT,
            peer: None,
            presence_interval: Duration::from_secs(crate::DEFAULT_PRESENCE_INTERVAL_SECS),
            reachability_timeout: Duration::from_secs(crate::DEFAULT_REACHABILITY_TIMEOUT_SECS),
        }
    }
}

/// Session timer configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval between local ticks while running
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Capacity of the session command queue
    pub command_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(crate::DEFAULT_TICK_INTERVAL_SECS),
            command_queue: crate::DEFAULT_COMMAND_QUEUE,
        }
    }
}

/// Heart-rate configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateConfig {
    /// Collect and display heart-rate samples
    pub enabled: bool,
    /// Interval between simulated samples
    #[serde(with = "humantime_serde")]
    pub sample_interval: Duration,
    /// Resting value the simulated source wanders around
    pub baseline_bpm: f64,
}

impl Default for HeartRateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval: Duration::from_secs(1),
            baseline_bpm: 72.0,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// If the configuration file doesn't exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to the default location.
    ///
    /// Creates the configuration directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create config directory: {e}"))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| Error::ConfigError(format!("Failed to write config: {e}")))
    }

    /// Get the default configuration directory path.
    #[must_use]
    pub fn config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "pulsesync", "PulseSync")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the full path to the configuration file.
    #[must_use]
    pub fn config_path() -> PathBuf {
        Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Check values that deserialize fine but cannot drive a session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if self.session.tick_interval.is_zero() {
            return Err(invalid("session.tick_interval", "must be greater than zero"));
        }
        if self.session.command_queue == 0 {
            return Err(invalid("session.command_queue", "must be greater than zero"));
        }
        if self.network.presence_interval.is_zero() {
            return Err(invalid(
                "network.presence_interval",
                "must be greater than zero",
            ));
        }
        if self.network.reachability_timeout <= self.network.presence_interval {
            return Err(invalid(
                "network.reachability_timeout",
                "must be longer than network.presence_interval",
            ));
        }
        if self.heart_rate.enabled && self.heart_rate.sample_interval.is_zero() {
            return Err(invalid(
                "heart_rate.sample_interval",
                "must be greater than zero",
            ));
        }
        if !(self.heart_rate.baseline_bpm.is_finite() && self.heart_rate.baseline_bpm > 0.0) {
            return Err(invalid("heart_rate.baseline_bpm", "must be a positive number"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::InvalidConfig {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a human-readable duration such as `"500ms"`, `"2s"` or `"1m"`.
///
/// Returns `None` for anything else.
#[must_use]
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        None
    }
}

/// Render a duration in the form accepted by [`parse_duration`].
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration format: {s}")))
    }
}
