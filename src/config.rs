//! Configuration file
//!
//! `bootctl.json`, every field optional. Unknown fields are rejected so a
//! misspelled key fails loudly instead of silently taking the default.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boot::{DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT};
use crate::observability::Severity;
use crate::service::current_slot::DEFAULT_CMDLINE_PATH;
use crate::service::{RetryPolicy, DEFAULT_COMMIT_RETRIES};
use crate::slot::{DEFAULT_NUM_SLOTS, MAX_SLOTS};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bootctl.json";

/// Default location of the slot metadata region
pub const DEFAULT_METADATA_PATH: &str = "/metadata/bootctl/slot_metadata.bin";

const MAX_COMMIT_RETRIES: u32 = 3;
const MAX_COMMIT_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// File or block device holding the two metadata banks
    #[serde(default = "default_metadata_path")]
    pub metadata_path: PathBuf,

    #[serde(default = "default_num_slots")]
    pub num_slots: usize,

    /// Boot attempts granted to a freshly activated slot
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,

    #[serde(default = "default_cmdline_path")]
    pub cmdline_path: PathBuf,

    /// Skip command line detection and use this slot
    #[serde(default)]
    pub current_slot: Option<u32>,

    /// By-name partition directory, e.g. `/dev/block/by-name`
    #[serde(default)]
    pub partition_dir: Option<PathBuf>,

    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,

    #[serde(default = "default_commit_backoff_ms")]
    pub commit_backoff_ms: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metadata_path() -> PathBuf {
    PathBuf::from(DEFAULT_METADATA_PATH)
}
fn default_num_slots() -> usize {
    DEFAULT_NUM_SLOTS
}
fn default_max_retries() -> u8 {
    DEFAULT_MAX_RETRIES
}
fn default_cmdline_path() -> PathBuf {
    PathBuf::from(DEFAULT_CMDLINE_PATH)
}
fn default_commit_retries() -> u32 {
    DEFAULT_COMMIT_RETRIES
}
fn default_commit_backoff_ms() -> u64 {
    20
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metadata_path: default_metadata_path(),
            num_slots: default_num_slots(),
            max_retries: default_max_retries(),
            cmdline_path: default_cmdline_path(),
            current_slot: None,
            partition_dir: None,
            commit_retries: default_commit_retries(),
            commit_backoff_ms: default_commit_backoff_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Parse a config file.
    ///
    /// Not validated here: command line overrides may still replace fields,
    /// so callers run `validate()` once on the final values.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.metadata_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("metadata_path must not be empty".into()));
        }

        if !(1..=MAX_SLOTS).contains(&self.num_slots) {
            return Err(ConfigError::Invalid(format!(
                "num_slots must be in 1..={}, got {}",
                MAX_SLOTS, self.num_slots
            )));
        }

        if !(1..=MAX_RETRIES_LIMIT).contains(&self.max_retries) {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be in 1..={}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }

        if let Some(slot) = self.current_slot {
            if slot as usize >= self.num_slots {
                return Err(ConfigError::Invalid(format!(
                    "current_slot {} is out of range for {} slots",
                    slot, self.num_slots
                )));
            }
        }

        if self.commit_retries > MAX_COMMIT_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "commit_retries must be <= {}",
                MAX_COMMIT_RETRIES
            )));
        }

        if self.commit_backoff_ms > MAX_COMMIT_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "commit_backoff_ms must be <= {}",
                MAX_COMMIT_BACKOFF_MS
            )));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn, error or fatal.",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Minimum log severity; validated configs always parse
    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Warn)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.commit_retries,
            Duration::from_millis(self.commit_backoff_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("bootctl.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_config_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "{}");
        let config = Config::load(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.num_slots, 2);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.log_severity(), Severity::Warn);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_config_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"{
                "metadata_path": "/tmp/meta.bin",
                "num_slots": 3,
                "current_slot": 2,
                "log_level": "info"
            }"#,
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.metadata_path, PathBuf::from("/tmp/meta.bin"));
        assert_eq!(config.num_slots, 3);
        assert_eq!(config.current_slot, Some(2));
        assert_eq!(config.log_severity(), Severity::Info);
    }

    #[test]
    fn test_config_validation() {
        let tmp = TempDir::new().unwrap();
        for body in [
            r#"{"num_slots": 0}"#,
            r#"{"num_slots": 5}"#,
            r#"{"max_retries": 16}"#,
            r#"{"current_slot": 2}"#,
            r#"{"commit_retries": 4}"#,
            r#"{"commit_backoff_ms": 5000}"#,
            r#"{"log_level": "verbose"}"#,
            r#"{"metadata_path": ""}"#,
        ] {
            let path = write_config(&tmp, body);
            let config = Config::load(&path).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "{} should be rejected",
                body
            );
        }
    }

    #[test]
    fn test_config_rejects_unknown_field() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, r#"{"num_slot": 2}"#);
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let absent = tmp.path().join("absent.json");
        assert!(matches!(Config::load(&absent), Err(ConfigError::Read { .. })));
        assert_eq!(Config::load_or_default(&absent).unwrap(), Config::default());
    }
}
