//! Error types for the harness

use rulebench_core::BackendError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Suite-level errors.
///
/// [`HarnessError::Setup`] and [`HarnessError::Isolation`] abort the run;
/// the rest are reported without touching the exit code.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// The backend is unreachable or the policy could not be loaded
    #[error("Setup failed: {0}")]
    Setup(String),

    /// Dataset reset failed, so later cases could see residual state
    #[error("Test isolation lost: {0}")]
    Isolation(String),

    /// Coverage report could not be fetched or written
    #[error("Coverage reporting failed: {0}")]
    Reporting(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config file parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl HarnessError {
    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Setup(_) | HarnessError::Isolation(_))
    }
}

/// Errors that end a single case.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaseError {
    /// A backend call failed for a reason other than policy denial
    #[error("{operation} failed: {error}")]
    Operation { operation: String, error: BackendError },

    /// A fixture could not be seeded
    #[error("Malformed fixture {path}: {reason}")]
    Fixture { path: String, reason: String },

    /// A client handle could not be opened; aborts the whole run
    #[error("Setup failed: {0}")]
    Setup(String),
}

impl CaseError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaseError::Setup(_))
    }
}

impl From<BackendError> for CaseError {
    fn from(error: BackendError) -> Self {
        CaseError::Operation { operation: error.kind().to_string(), error }
    }
}

impl From<HarnessError> for CaseError {
    fn from(error: HarnessError) -> Self {
        CaseError::Setup(error.to_string())
    }
}

/// How a case failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Expected allow but got deny, or the reverse, or a failed check
    AssertionMismatch,
    /// Network error, timeout, malformed fixture, unexpected backend error
    Infrastructure,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::AssertionMismatch => write!(f, "assertion_mismatch"),
            FailureKind::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
