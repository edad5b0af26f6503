//! Error types for fieldcheck

use thiserror::Error;

/// Core error type for fieldcheck operations.
///
/// Each variant is one kind of the operation error taxonomy. The message is
/// human readable and is shown to the end user as-is, so gate failures carry
/// the concrete numbers that caused the rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldcheckError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FieldcheckError {
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The user-facing message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::NotFound(m)
            | Self::PermissionDenied(m)
            | Self::Conflict(m)
            | Self::PreconditionFailed(m)
            | Self::InvalidArgument(m)
            | Self::Internal(m) => m,
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldcheckError>;
