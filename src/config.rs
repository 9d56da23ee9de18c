//! Configuration management module.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stick::{MAX_NACK_RETRIES, Playback};

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Stick connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial/RFCOMM device path, or `tcp://host:port`.
    pub address: String,
    /// Serial baud rate (default: 115200). Ignored for TCP.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Read/write timeout in seconds, 0 blocks forever (default: 5).
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Resends after a nack before giving up (default: 0).
    #[serde(default)]
    pub nack_retries: u8,
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_io_timeout_secs() -> u64 {
    5
}

impl DeviceConfig {
    /// Transport timeout, `None` meaning block forever.
    pub fn io_timeout(&self) -> Option<Duration> {
        (self.io_timeout_secs > 0).then(|| Duration::from_secs(self.io_timeout_secs))
    }
}

/// Default playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    pub brightness: f32,
    pub delay_ms: u8,
    pub loop_image: bool,
}

impl PlaybackConfig {
    pub fn to_playback(&self) -> Playback {
        Playback {
            brightness: self.brightness,
            delay_ms: self.delay_ms,
            looping: self.loop_image,
        }
    }
}

impl AppConfig {
    /// Get config file path (platform config directory, else next to the executable).
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("com.github", "lorentz83", "alps")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| {
                std::env::current_exe()
                    .ok()
                    .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            })
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.address.trim().is_empty() {
            return Err(ConfigError::Validation("Device address cannot be empty".to_string()));
        }
        if self.device.baud_rate == 0 {
            return Err(ConfigError::Validation("Baud rate must be greater than 0".to_string()));
        }
        if self.device.nack_retries > MAX_NACK_RETRIES {
            return Err(ConfigError::Validation(format!(
                "Nack retries cannot exceed {MAX_NACK_RETRIES}"
            )));
        }
        if !(0.0..=1.0).contains(&self.playback.brightness) {
            return Err(ConfigError::Validation(
                "Brightness must be between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: "/dev/rfcomm0".to_string(),
            baud_rate: default_baud_rate(),
            io_timeout_secs: default_io_timeout_secs(),
            nack_retries: 0,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            brightness: 0.5,
            delay_ms: 0,
            loop_image: false,
        }
    }
}
