//! Error types for matchday operations

use std::time::Duration;
use thiserror::Error;

/// Failures talking to an upstream content source (static feed, search oracle).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Request to {source_name} failed: {reason}")]
    Http { source_name: String, reason: String },

    #[error("Request to {source_name} timed out after {timeout:?}")]
    Timeout {
        source_name: String,
        timeout: Duration,
    },

    #[error("{source_name} answered with status {status}")]
    Status { source_name: String, status: u16 },

    #[error("Could not decode {source_name} payload: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("Structured store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl SourceError {
    pub fn http(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Http {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Structured store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store connection failed: {reason}")]
    Connection { reason: String },

    #[error("Store command {command} failed for key {key}: {reason}")]
    Command {
        command: String,
        key: String,
        reason: String,
    },

    #[error("Store command {command} timed out for key {key}")]
    Timeout { command: String, key: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all matchday errors.
#[derive(Debug, Clone, Error)]
pub enum MatchdayError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for matchday operations.
pub type MatchdayResult<T> = Result<T, MatchdayError>;
