use std::time::Duration;

use thiserror::Error;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Infrastructure errors for queue operations.
///
/// Expected races (an id that vanished, an empty store) are never errors;
/// they surface as `bool`/`Option` results from the engine instead.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Timed out after {timeout:?} waiting for the queue lock")]
    LockTimeout { timeout: Duration },

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueueError {
    /// Whether retrying the whole operation later may succeed.
    ///
    /// Only lock contention qualifies; a failed write stays failed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Why a single command execution failed. Every variant routes the job
/// through the `fail` transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("exited with code {code}")]
    NonZeroExit { code: i32 },

    #[error("command not found")]
    CommandNotFound,

    #[error("timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("{0}")]
    Other(String),
}

impl ExecutionFailure {
    /// Create a failure from any displayable error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Errors raised while loading or editing the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown config key `{0}`")]
    UnknownKey(String),

    #[error("invalid value for `{key}`: expected {expected}")]
    InvalidValue { key: String, expected: &'static str },

    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
