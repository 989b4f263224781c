//! Configuration management for recsched
//!
//! This module handles loading and validating configuration from environment variables,
//! TOML files, and command-line arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::schedule::entry::MAX_DURATION_HOURS;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "recsched.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File locations
    pub paths: PathsConfig,

    /// Device control link
    pub link: LinkConfig,

    /// Status polling
    pub status: StatusConfig,

    /// Scheduling engine
    pub engine: EngineConfig,

    /// Still-image capture
    pub snapshot: SnapshotConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Schedule JSON file
    pub schedule_file: PathBuf,

    /// Device map JSON file
    pub device_file: PathBuf,

    /// Root the recording paths sent to devices are relative to
    pub recording_root: PathBuf,

    /// Root the snapshot paths sent to devices are relative to
    pub snapshot_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            schedule_file: PathBuf::from("data/schedule.json"),
            device_file: PathBuf::from("data/encoders.json"),
            recording_root: PathBuf::from("recordings"),
            snapshot_root: PathBuf::from("snapshots"),
        }
    }
}

/// Device control link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Quiet period that ends a response, in milliseconds
    pub read_timeout_ms: u64,

    /// WHATWG label of the line encoding (big5, utf-8, euc-kr, ...)
    pub encoding: String,

    /// Word a device replies with on success
    pub success_token: String,

    /// Encoder channel used in Setfile/Start/Stop
    pub channel: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 3_000,
            read_timeout_ms: 2_000,
            encoding: String::from("big5"),
            success_token: String::from("OK"),
            channel: 1,
        }
    }
}

/// Status polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Minimum spacing between queries of one device, in milliseconds
    pub cooldown_ms: u64,

    /// Re-log interval for unchanged responses, in seconds
    pub log_interval_secs: u64,

    /// Background refresh interval, in seconds
    pub refresh_interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: 800,
            log_interval_secs: 10,
            refresh_interval_secs: 5,
        }
    }
}

/// Scheduling engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reconciliation period in milliseconds
    pub tick_ms: u64,

    /// Minimum spacing of status-driven saves, in seconds
    pub save_interval_secs: u64,

    /// Worker pool size
    pub workers: usize,

    /// Deleted entries kept for undo
    pub undo_depth: usize,

    /// Failed stop attempts before an entry is given up
    pub max_stop_attempts: u32,

    /// Length of a manually started recording, in hours
    pub manual_duration_hours: f64,

    /// Capture a still image after each successful start
    pub snapshot_on_start: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            save_interval_secs: 10,
            workers: 4,
            undo_depth: 20,
            max_stop_attempts: 3,
            manual_duration_hours: 1.0,
            snapshot_on_start: true,
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Overall wait for the image file, in milliseconds
    pub timeout_ms: u64,

    /// Filesystem poll interval, in milliseconds
    pub poll_interval_ms: u64,

    /// Preview retention in minutes
    pub keep_minutes: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 6_000,
            poll_interval_ms: 250,
            keep_minutes: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("RECSCHED_SCHEDULE_FILE") {
            config.paths.schedule_file = v.into();
        }
        if let Ok(v) = std::env::var("RECSCHED_DEVICE_FILE") {
            config.paths.device_file = v.into();
        }
        if let Ok(v) = std::env::var("RECSCHED_RECORDING_ROOT") {
            config.paths.recording_root = v.into();
        }
        if let Ok(v) = std::env::var("RECSCHED_SNAPSHOT_ROOT") {
            config.paths.snapshot_root = v.into();
        }

        if let Some(v) = env_parse("RECSCHED_CONNECT_TIMEOUT_MS") {
            config.link.connect_timeout_ms = v;
        }
        if let Some(v) = env_parse("RECSCHED_READ_TIMEOUT_MS") {
            config.link.read_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("RECSCHED_ENCODING") {
            config.link.encoding = v;
        }
        if let Ok(v) = std::env::var("RECSCHED_SUCCESS_TOKEN") {
            config.link.success_token = v;
        }
        if let Some(v) = env_parse("RECSCHED_CHANNEL") {
            config.link.channel = v;
        }

        if let Some(v) = env_parse("RECSCHED_STATUS_COOLDOWN_MS") {
            config.status.cooldown_ms = v;
        }
        if let Some(v) = env_parse("RECSCHED_STATUS_REFRESH_SECS") {
            config.status.refresh_interval_secs = v;
        }

        if let Some(v) = env_parse("RECSCHED_TICK_MS") {
            config.engine.tick_ms = v;
        }
        if let Some(v) = env_parse("RECSCHED_SAVE_INTERVAL_SECS") {
            config.engine.save_interval_secs = v;
        }
        if let Some(v) = env_parse("RECSCHED_WORKERS") {
            config.engine.workers = v;
        }
        if let Some(v) = env_parse("RECSCHED_MAX_STOP_ATTEMPTS") {
            config.engine.max_stop_attempts = v;
        }
        if let Some(v) = env_parse("RECSCHED_MANUAL_DURATION_HOURS") {
            config.engine.manual_duration_hours = v;
        }
        if let Some(v) = env_parse("RECSCHED_SNAPSHOT_ON_START") {
            config.engine.snapshot_on_start = v;
        }

        if let Some(v) = env_parse("RECSCHED_SNAPSHOT_TIMEOUT_MS") {
            config.snapshot.timeout_ms = v;
        }
        if let Some(v) = env_parse("RECSCHED_SNAPSHOT_KEEP_MINUTES") {
            config.snapshot.keep_minutes = v;
        }

        if let Ok(v) = std::env::var("RECSCHED_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("RECSCHED_LOG_FORMAT") {
            config.logging.format = v;
        }

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path`, else `recsched.toml` if present, else the environment,
    /// then validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let default_file = Path::new(DEFAULT_CONFIG_FILE);
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if default_file.exists() => Self::from_file(default_file)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.link.connect_timeout_ms == 0 || self.link.read_timeout_ms == 0 {
            anyhow::bail!("link timeouts must be greater than 0");
        }

        if encoding_rs::Encoding::for_label(self.link.encoding.trim().as_bytes()).is_none()
            && !self.link.encoding.trim().eq_ignore_ascii_case("cp950")
        {
            anyhow::bail!("unknown link encoding '{}'", self.link.encoding);
        }

        if self.link.success_token.trim().is_empty() {
            anyhow::bail!("success_token must not be empty");
        }

        if self.engine.tick_ms == 0 {
            anyhow::bail!("tick_ms must be greater than 0");
        }

        if self.engine.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.engine.max_stop_attempts == 0 {
            anyhow::bail!("max_stop_attempts must be greater than 0");
        }

        if !(self.engine.manual_duration_hours > 0.0)
            || self.engine.manual_duration_hours > MAX_DURATION_HOURS
        {
            anyhow::bail!("manual_duration_hours must be positive and at most {MAX_DURATION_HOURS}");
        }

        if self.snapshot.poll_interval_ms == 0 {
            anyhow::bail!("snapshot poll_interval_ms must be greater than 0");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging format must be 'text' or 'json'");
        }

        Ok(())
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.link.connect_timeout_ms)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.link.read_timeout_ms)
    }

    #[must_use]
    pub fn status_cooldown(&self) -> Duration {
        Duration::from_millis(self.status.cooldown_ms)
    }

    #[must_use]
    pub fn status_log_interval(&self) -> Duration {
        Duration::from_secs(self.status.log_interval_secs)
    }

    /// Background status refresh period; zero disables it
    #[must_use]
    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.status.refresh_interval_secs)
    }

    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.engine.tick_ms)
    }

    #[must_use]
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.engine.save_interval_secs)
    }

    #[must_use]
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot.timeout_ms)
    }

    #[must_use]
    pub fn snapshot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_workers() {
        let mut config = Config::default();
        config.engine.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_encoding() {
        let mut config = Config::default();
        config.link.encoding = String::from("not-an-encoding");
        assert!(config.validate().is_err());

        config.link.encoding = String::from("cp950");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_conversion() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.status_cooldown(), Duration::from_millis(800));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recsched.toml");
        std::fs::write(
            &path,
            "[link]\nencoding = \"utf-8\"\n\n[engine]\nmax_stop_attempts = 5\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.link.encoding, "utf-8");
        assert_eq!(config.link.read_timeout_ms, 2_000);
        assert_eq!(config.engine.max_stop_attempts, 5);
        assert_eq!(config.engine.workers, 4);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nformat = \"xml\"\n").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
