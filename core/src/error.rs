//! Error types for thunder-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of orchestration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchErrorKind {
    /// Invalid run configuration
    Config,
    /// A required builder field was never set
    MissingConfig,
    /// A worker could not be created or failed internally
    Worker,
    /// The orchestrator control loop could not make progress
    Orchestration,
    /// The run was stopped before the operation could finish
    Shutdown,
}

impl std::fmt::Display for BenchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchErrorKind::Config => write!(f, "configuration error"),
            BenchErrorKind::MissingConfig => write!(f, "missing configuration"),
            BenchErrorKind::Worker => write!(f, "worker error"),
            BenchErrorKind::Orchestration => write!(f, "orchestration error"),
            BenchErrorKind::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Core error type
///
/// Per-connection failures never surface as a `BenchError`; they travel as
/// `error` reports and end up in the run metrics. This type covers the
/// failures that prevent a run from starting or finishing.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct BenchError {
    /// Failure classification
    pub kind: BenchErrorKind,
    /// Human readable detail
    pub message: String,
}

impl BenchError {
    /// Create an error of the given kind
    pub fn new(kind: BenchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Config, message)
    }

    /// A builder was finalized without a required field
    pub fn missing_config(field: &str) -> Self {
        Self::new(
            BenchErrorKind::MissingConfig,
            format!("required field `{field}` was not set"),
        )
    }

    /// Worker failure
    pub fn worker(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Worker, message)
    }

    /// Control loop failure
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Orchestration, message)
    }

    /// Operation aborted by shutdown
    pub fn shutdown() -> Self {
        Self::new(BenchErrorKind::Shutdown, "run is shutting down")
    }

    /// Whether this error was raised before any worker could be spawned
    pub fn is_config(&self) -> bool {
        matches!(
            self.kind,
            BenchErrorKind::Config | BenchErrorKind::MissingConfig
        )
    }
}

impl From<crate::config::ConfigError> for BenchError {
    fn from(err: crate::config::ConfigError) -> Self {
        BenchError::config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
