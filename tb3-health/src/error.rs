//! Error types for the health poller
//!
//! - `SourceError`: one telemetry query failed (recovered inside the poll)
//! - `HealthError`: poller lifecycle and export failures
//! - `ConfigError`: configuration loading and validation

use std::time::Duration;

/// Failure of a single subsystem query
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("no data: {0}")]
    NoData(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("host metrics unavailable: {0}")]
    Host(String),
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("poller did not stop within {0:?}, task aborted")]
    ShutdownTimeout(Duration),
    #[error("no snapshot has been taken yet")]
    NoSnapshot,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
