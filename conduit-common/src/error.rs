//! Shared error taxonomy (input / transient / conflict / corruption).
//!
//! Both the Core (axum/tonic) and the Bridge map these variants onto their
//! own transport-specific status codes; the taxonomy itself lives here so
//! neither crate re-derives it.

use thiserror::Error;

/// A stable, machine-readable error code returned to end-user clients
/// alongside a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidArgument,
    Unavailable,
    Conflict,
    Corruption,
    Unauthorized,
    NotFound,
    Internal,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("data corruption detected: {0}")]
    Corruption(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            CoreError::Transient(_) => ErrorCode::Unavailable,
            CoreError::Conflict(_) => ErrorCode::Conflict,
            CoreError::Corruption(_) => ErrorCode::Corruption,
            CoreError::Unauthorized(_) => ErrorCode::Unauthorized,
            CoreError::NotFound(_) => ErrorCode::NotFound,
            CoreError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether a caller may safely retry the operation that produced this
    /// error under the idempotency guarantees in place across the system.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("event missing identity key: {0}")]
    MissingIdentity(String),

    #[error("unrecognized event shape: {0}")]
    Unrecognized(String),
}
