//! Persistence layer for fieldcheckd
//!
//! Provides:
//! - Record sets for users, schools, schedule slots, and sessions
//! - Conditional session updates (compare-and-set on status)
//! - Audit log (append-only)

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use fieldcheck_util::FieldcheckError;
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be turned back into a record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<StoreError> for FieldcheckError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => FieldcheckError::not_found(msg),
            StoreError::Conflict(msg) => FieldcheckError::conflict(msg),
            other => FieldcheckError::internal(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
