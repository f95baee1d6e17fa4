//! Error types for the progression engine.
//!
//! Nothing here is meant to be fatal to a running discussion. Construction and
//! persistence return [`ProgressionError`]; the enhancement service has its own
//! [`EnhanceError`] which the consequence generator always swallows.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for progression operations
pub type ProgressionResult<T> = Result<T, ProgressionError>;

/// Errors from building, configuring, or persisting a progression engine.
#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("pattern for concept '{concept}' failed to compile: {source}")]
    Pattern {
        concept: String,
        #[source]
        source: regex::Error,
    },

    #[error("no consequence-test templates available for {0}")]
    EmptyTemplateBank(String),

    #[error("state I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("checkpoint version mismatch: expected <= {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("checkpoint integrity check failed: {0}")]
    IntegrityCheckFailed(String),
}

impl ProgressionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from the optional prompt enhancement service.
#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("enhancement request failed: {0}")]
    RequestFailed(String),

    #[error("enhancement service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("enhancement service returned no usable text")]
    EmptyResponse,

    #[error("enhancer not configured: {0}")]
    NotConfigured(String),
}

impl From<reqwest::Error> for EnhanceError {
    fn from(err: reqwest::Error) -> Self {
        EnhanceError::RequestFailed(err.to_string())
    }
}
