//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Request payload failed validation
    #[error("{0}")]
    Validation(String),
    /// Row exists but its current state forbids the operation
    #[error("{0}")]
    InvalidState(String),
    /// Unique constraint or duplicate submission
    #[error("{0}")]
    Conflict(String),
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(String),
    /// External service error
    #[error("External service error: {0}")]
    External(String),
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed") {
            DomainError::Conflict("A record with the same unique value already exists".to_string())
        } else {
            DomainError::Database(msg)
        }
    }
}
