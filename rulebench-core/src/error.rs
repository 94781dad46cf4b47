//! Errors reported by a document backend.

use thiserror::Error;

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors a [`Backend`](crate::Backend) or [`Session`](crate::Session) can raise.
///
/// Only [`BackendError::PermissionDenied`] is a policy decision. Every other
/// variant is an infrastructure problem and must never be read as a denial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The access-control policy rejected the operation
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    /// The target document does not exist
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The backend answered with a non-policy error status
    #[error("Backend error ({code} {status}): {message}")]
    Status { code: u16, status: String, message: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// A document or collection path is malformed
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Whether this error is the policy engine rejecting an operation.
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, BackendError::PermissionDenied { .. })
    }

    /// Short machine-readable label, used in reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::PermissionDenied { .. } => "permission_denied",
            BackendError::NotFound(_) => "not_found",
            BackendError::Status { .. } => "status",
            BackendError::Transport(_) => "transport",
            BackendError::Timeout(_) => "timeout",
            BackendError::Codec(_) => "codec",
            BackendError::InvalidPath { .. } => "invalid_path",
            BackendError::Config(_) => "config",
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Codec(err.to_string())
    }
}
