//! Configuration management for Aethon
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files.

use crate::error::{AethonError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rivian account and session configuration
    pub rivian: RivianConfig,

    /// Enphase IQ Gateway configuration
    pub enphase: EnphaseConfig,

    /// Hubitat hub configuration (optional - automation falls back to
    /// solar-only mode without it)
    #[serde(default)]
    pub hubitat: Option<HubitatConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Seconds between automation cycles
    pub cycle_interval_secs: u64,

    /// Timezone for the day/night decision
    pub timezone: String,

    /// Count home-battery discharge as grid consumption when sampling
    #[serde(default = "default_true")]
    pub include_battery_usage: bool,
}

/// Rivian cloud API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RivianConfig {
    /// Account email
    pub username: String,

    /// Account password
    pub password: String,

    /// Path of the persisted session token file
    pub session_file: String,
}

/// Enphase IQ Gateway connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnphaseConfig {
    /// Hostname or IP of the local gateway
    pub host: String,

    /// Long-lived gateway JWT
    pub token: String,
}

/// Hubitat Maker API parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubitatConfig {
    /// Base URL of the hub, e.g. `http://192.168.1.50`
    pub host: String,

    /// Maker API app instance id
    pub app_id: u32,

    /// Maker API access token
    pub access_token: String,

    /// Virtual switch gating the whole automation
    pub automation_switch_id: u32,

    /// Dimmer-style switch: on/off gates night charging, level is the limit
    pub night_charge_switch_id: u32,

    /// Variable device receiving the status message
    pub status_device_id: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (or directory for rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Default for RivianConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            session_file: "/data/aethon_rivian_session.json".to_string(),
        }
    }
}

impl Default for EnphaseConfig {
    fn default() -> Self {
        Self {
            host: "envoy.local".to_string(),
            token: String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/aethon.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rivian: RivianConfig::default(),
            enphase: EnphaseConfig::default(),
            hubitat: None,
            logging: LoggingConfig::default(),
            cycle_interval_secs: 600,
            timezone: "UTC".to_string(),
            include_battery_usage: true,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with validation
    pub fn load() -> Result<Self> {
        // Try to load from default locations
        let default_paths = [
            "aethon_config.yaml",
            "/data/aethon_config.yaml",
            "/etc/aethon/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.enphase.host.is_empty() {
            return Err(AethonError::validation(
                "enphase.host",
                "Gateway host cannot be empty",
            ));
        }

        if self.rivian.session_file.is_empty() {
            return Err(AethonError::validation(
                "rivian.session_file",
                "Session file path cannot be empty",
            ));
        }

        if let Some(hubitat) = &self.hubitat
            && hubitat.host.is_empty()
        {
            return Err(AethonError::validation(
                "hubitat.host",
                "Hub URL cannot be empty",
            ));
        }

        if self.cycle_interval_secs == 0 {
            return Err(AethonError::validation(
                "cycle_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(AethonError::validation(
                "timezone",
                "Unknown timezone name",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cycle_interval_secs, 600);
        assert_eq!(config.timezone, "UTC");
        assert!(config.include_battery_usage);
        assert!(config.hubitat.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        // Test invalid gateway host
        config.enphase.host = String::new();
        assert!(config.validate().is_err());

        // Reset and test invalid interval
        config = Config::default();
        config.cycle_interval_secs = 0;
        assert!(config.validate().is_err());

        // Reset and test invalid timezone
        config = Config::default();
        config.timezone = "Mars/Olympus_Mons".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.cycle_interval_secs, deserialized.cycle_interval_secs);
        assert_eq!(config.enphase.host, deserialized.enphase.host);
    }
}
