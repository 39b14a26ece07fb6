//! Configuration loading and validation

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "ZKATTEND_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset
pub const DEFAULT_CONFIG_FILE: &str = "zkattend.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory receiving CSV and backup artifacts
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Append-only error log
    #[serde(default = "default_error_log")]
    pub error_log: PathBuf,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Known terminals, in menu order
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            error_log: default_error_log(),
            connection: ConnectionConfig::default(),
            scan: ScanConfig::default(),
            schedule: ScheduleConfig::default(),
            devices: default_devices(),
        }
    }
}

impl Config {
    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.connection.port == 0 {
            return Err(Error::Config("connection.port cannot be 0".into()));
        }
        if self.connection.timeout_secs == 0 {
            return Err(Error::Config("connection.timeout_secs must be positive".into()));
        }
        if self.scan.probe_timeout_ms == 0 {
            return Err(Error::Config("scan.probe_timeout_ms must be positive".into()));
        }
        self.schedule.daily_time()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Port for devices that do not name one in their address
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect and per-reply timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// CommKey password
    #[serde(default)]
    pub password: u32,
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            password: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

impl ScanConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local wall-clock time of the daily fetch, `HH:MM`
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

impl ScheduleConfig {
    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_at.trim(), "%H:%M").map_err(|_| {
            Error::Config(format!(
                "schedule.daily_at must be HH:MM, got '{}'",
                self.daily_at
            ))
        })
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_at: default_daily_at(),
        }
    }
}

/// One `[[devices]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Menu key; defaults to the 1-based position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub name: String,
    /// `a.b.c.d` or `a.b.c.d:port`
    pub address: String,
}

impl DeviceEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            key: None,
            name: name.into(),
            address: address.into(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_error_log() -> PathBuf {
    PathBuf::from("error_log.txt")
}

fn default_port() -> u16 {
    4370
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_probe_timeout_ms() -> u64 {
    100
}

fn default_daily_at() -> String {
    "09:00".to_string()
}

fn default_devices() -> Vec<DeviceEntry> {
    vec![
        DeviceEntry::new("MainWarehouse", "10.10.10.202"),
        DeviceEntry::new("HeadOffice", "10.10.10.201"),
        DeviceEntry::new("MerghanyBranch", "196.202.26.217"),
        DeviceEntry::new("MaadiBranch", "196.202.19.227"),
        DeviceEntry::new("KhufuBranch", "192.168.1.201"),
        DeviceEntry::new("The-StripBranch", "196.221.149.209"),
        DeviceEntry::new("OraBranch", "192.168.1.201"),
    ]
}

/// Path named by [`CONFIG_ENV`], or [`DEFAULT_CONFIG_FILE`]
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Parse and validate configuration text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults when it is absent
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let config = parse_config(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.devices.len(), 7);
        assert_eq!(config.devices[0].name, "MainWarehouse");
        assert_eq!(config.devices[6].address, "192.168.1.201");
        assert_eq!(config.connection.port, 4370);
        assert_eq!(config.scan.probe_timeout(), Duration::from_millis(100));
        assert_eq!(
            config.schedule.daily_time().unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap()
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(parse_config("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_full_file() {
        let config = parse_config(
            r#"
            output_dir = "/var/lib/zkattend"

            [connection]
            port = 4371
            timeout_secs = 10
            password = 1234

            [schedule]
            daily_at = "18:30"

            [[devices]]
            name = "Lab"
            address = "10.0.0.5"

            [[devices]]
            key = "x"
            name = "Annex"
            address = "10.0.0.6:5005"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/var/lib/zkattend"));
        assert_eq!(config.error_log, PathBuf::from("error_log.txt"));
        assert_eq!(config.connection.timeout(), Duration::from_secs(10));
        assert_eq!(config.connection.password, 1234);
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.devices[1].key.as_deref(), Some("x"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            parse_config("[schedule]\ndaily_at = \"9am\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[connection]\nport = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[connection]\nport = \"many\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zkattend.toml");
        std::fs::write(&path, "[scan]\nprobe_timeout_ms = 250\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.scan.probe_timeout_ms, 250);
        assert_eq!(config.devices.len(), 7);
    }
}
