//! # Configuration Management Module
//!
//! Settings shared by the server and client binaries, stored as TOML in a
//! platform-appropriate location. Command-line flags override these values;
//! the resulting `Config` is handed to components by value.
//!
//! ## Settings
//! - `address`: Server listen / client connect address (`host:port`)
//! - `general_log` / `alert_log`: Server log sink files
//! - `min_severity`: Lowest severity that sounds an audio alert
//! - `use_color`: ANSI colors in client output
//! - `push_interval_ms`: Server reading cadence
//!
//! ## Storage Location
//! - macOS: ~/Library/Application Support/ecg-monitor/config.toml
//! - Linux: ~/.config/ecg-monitor/config.toml
//! - Windows: %APPDATA%\ecg-monitor\config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address: String,
    pub general_log: PathBuf,
    pub alert_log: PathBuf,
    /// Kept as text so an unrecognised value disables audio instead of failing to load
    pub min_severity: String,
    pub use_color: bool,
    pub push_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "localhost:8080".to_string(),
            general_log: PathBuf::from("server/logs/ecg.log"),
            alert_log: PathBuf::from("server/logs/alerts.log"),
            min_severity: "warning".to_string(),
            use_color: true,
            push_interval_ms: 1000,
        }
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ecg-monitor")
            .join("config.toml")
    }

    /// Load config from the default location, or create default if it doesn't exist
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Load config from `path`, writing defaults there if the file is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = toml::from_str(&contents)
                    .map_err(ConfigError::ParseFailed)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(path)?;
                Ok(config)
            }
            Err(e) => Err(ConfigError::ReadFailed(e)),
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(ConfigError::WriteFailed)?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(ConfigError::SerializeFailed)?;
        fs::write(path, toml_string)
            .map_err(ConfigError::WriteFailed)?;

        Ok(())
    }

    /// Push cadence, never shorter than one millisecond
    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.address, "localhost:8080");
        assert_eq!(config.min_severity, "warning");
        assert!(config.use_color);
        assert_eq!(config.push_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            use_color: false,
            min_severity: "critical".to_string(),
            ..Config::default()
        };

        let toml_str = toml::to_string(&config).expect("Failed to serialize");
        assert!(toml_str.contains("use_color = false"));
        assert!(toml_str.contains("min_severity = \"critical\""));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            address = "0.0.0.0:9000"
            push_interval_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.address, "0.0.0.0:9000");
        assert_eq!(config.push_interval(), Duration::from_millis(250));
        assert_eq!(config.min_severity, "warning");
        assert_eq!(config.alert_log, PathBuf::from("server/logs/alerts.log"));
    }

    #[test]
    fn test_load_from_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let config = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            address: "127.0.0.1:7000".to_string(),
            use_color: false,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "address = [").unwrap();

        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));
    }
}
