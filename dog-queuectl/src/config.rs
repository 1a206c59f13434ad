//! Operator-tunable settings, persisted as a flat JSON object.
//!
//! A missing file falls back to defaults and missing keys take their default
//! value, so an old `config.json` keeps working after new keys are added.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::ConfigError;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Default failure budget for new jobs
    pub max_retries: u32,
    /// Exponential base for retry delays, in seconds
    pub backoff_base: u32,
    /// Ceiling on a single retry delay
    pub max_backoff_seconds: u64,
    /// Durable store document
    pub storage_file: PathBuf,
    /// Resource backing the cross-process lock
    pub lock_file: PathBuf,
    /// How long an operation waits for the lock
    pub lock_timeout_seconds: u64,
    /// Interval between worker heartbeats
    pub worker_heartbeat_seconds: u64,
    /// Heartbeat age after which a worker no longer counts as active
    pub worker_timeout_seconds: u64,
    /// Wall-clock limit for a single command
    pub job_timeout_seconds: u64,
    /// Idle wait when no job is eligible
    pub poll_interval_ms: u64,
    /// How long `worker start` waits for children before killing them
    pub shutdown_grace_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2,
            max_backoff_seconds: 3600, // 1 hour
            storage_file: PathBuf::from("queue.json"),
            lock_file: PathBuf::from("queue.lock"),
            lock_timeout_seconds: 10,
            worker_heartbeat_seconds: 10,
            worker_timeout_seconds: 30,
            job_timeout_seconds: 60,
            poll_interval_ms: 1000,
            shutdown_grace_seconds: 5,
        }
    }
}

impl QueueConfig {
    /// Load from `path`, returning defaults when the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file missing, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Update one key by name. The value is parsed as the key's current
    /// JSON type; unknown keys and mistyped values are rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut fields: Map<String, Value> = serde_json::from_value(serde_json::to_value(&*self)?)?;

        let current = fields
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let parsed = match current {
            Value::Number(_) => value
                .trim()
                .parse::<u64>()
                .map(Value::from)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    expected: "a non-negative integer",
                })?,
            _ => Value::String(value.to_string()),
        };
        fields.insert(key.to_string(), parsed);

        // Round-trip to catch values that fit u64 but not the field's type
        *self = serde_json::from_value(Value::Object(fields)).map_err(|_| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                expected: "a value in range for this key",
            }
        })?;
        Ok(())
    }

    /// All key names, sorted
    pub fn keys() -> Vec<String> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(fields)) => fields.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_seconds)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.worker_heartbeat_seconds)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_seconds)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}
