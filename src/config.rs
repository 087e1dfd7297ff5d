//! Input subsystem configuration
//!
//! Stored as TOML under `<config dir>/operator-input/config.toml`. A missing
//! file is replaced by the defaults, which match the stock panel wiring.

use crate::input::keyboard::{Key, KeyPair};
use crate::input::oi_frame::MAX_CHANNELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "operator-input";
const CONFIG_FILE: &str = "config.toml";

/// Serial timeouts are kept in tenths of a second, at most 255 of them
pub const MIN_READ_TIMEOUT_MS: u64 = 100;
pub const MAX_READ_TIMEOUT_MS: u64 = 25_500;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub oi: OiConfig,
    pub joystick: JoystickConfig,
    pub control: ControlConfig,
}

/// Operator panel serial link
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OiConfig {
    pub device_path: PathBuf,
    pub baud_rate: u32,
    /// Wired panel inputs, at most 32
    pub channel_count: usize,
    /// Serial read timeout; 0 blocks until the next byte, otherwise
    /// `MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS`
    pub read_timeout_ms: u64,
    /// Zero the payload after each frame instead of keeping stale bytes
    pub clear_on_sentinel: bool,
}

impl OiConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for OiConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/ttyACM0"),
            baud_rate: 9600,
            channel_count: 24,
            read_timeout_ms: 500,
            clear_on_sentinel: false,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct JoystickConfig {
    pub stick_count: usize,
    /// Drive the axes from the keyboard while a stick is unplugged
    pub keyboard_fallback: bool,
    pub x_keys: KeyPair,
    pub y_keys: KeyPair,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            stick_count: 1,
            keyboard_fallback: true,
            x_keys: KeyPair::new(Key::A, Key::D),
            y_keys: KeyPair::new(Key::S, Key::W),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    pub tick_interval_ms: u64,
    /// Stick whose axes the control loop reports
    pub stick: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 20,
            stick: 0,
        }
    }
}

impl InputConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config from the default location, writing defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            warn!(
                "Config file {} does not exist, writing defaults",
                path.display()
            );
            let config = Self::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, content).map_err(write_err)?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oi.channel_count == 0 || self.oi.channel_count > MAX_CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "oi.channel_count must be within 1..={}, got {}",
                MAX_CHANNELS, self.oi.channel_count
            )));
        }
        let timeout = self.oi.read_timeout_ms;
        if timeout != 0 && !(MIN_READ_TIMEOUT_MS..=MAX_READ_TIMEOUT_MS).contains(&timeout) {
            return Err(ConfigError::Invalid(format!(
                "oi.read_timeout_ms must be 0 or within {}..={}, got {}",
                MIN_READ_TIMEOUT_MS, MAX_READ_TIMEOUT_MS, timeout
            )));
        }
        if self.joystick.stick_count == 0 {
            return Err(ConfigError::Invalid(
                "joystick.stick_count must be at least 1".to_string(),
            ));
        }
        if self.control.stick >= self.joystick.stick_count {
            return Err(ConfigError::Invalid(format!(
                "control.stick {} is not below joystick.stick_count {}",
                self.control.stick, self.joystick.stick_count
            )));
        }
        if self.control.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "control.tick_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        InputConfig::default().validate().unwrap();
    }

    #[test]
    fn save_and_load_preserve_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = InputConfig::default();
        config.oi.channel_count = 12;
        config.oi.clear_on_sentinel = true;
        config.joystick.keyboard_fallback = false;
        config.joystick.x_keys = KeyPair::new(Key::Left, Key::Right);
        config.save_to(&path).unwrap();

        assert_eq!(InputConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[oi]\ndevice_path = \"/dev/ttyUSB1\"\n").unwrap();

        let config = InputConfig::load_from(&path).unwrap();
        assert_eq!(config.oi.device_path, PathBuf::from("/dev/ttyUSB1"));
        assert_eq!(config.oi.baud_rate, 9600);
        assert_eq!(config.joystick, JoystickConfig::default());
    }

    #[test]
    fn oversized_channel_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[oi]\nchannel_count = 40\n").unwrap();

        assert!(matches!(
            InputConfig::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn sub_decisecond_read_timeout_is_rejected() {
        for timeout in [1, 50, 99, 25_501] {
            let mut config = InputConfig::default();
            config.oi.read_timeout_ms = timeout;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "read_timeout_ms = {} accepted",
                timeout
            );
        }

        for timeout in [0, MIN_READ_TIMEOUT_MS, 500, MAX_READ_TIMEOUT_MS] {
            let mut config = InputConfig::default();
            config.oi.read_timeout_ms = timeout;
            config.validate().unwrap();
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = InputConfig::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
