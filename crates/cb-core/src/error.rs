//! # AppError
//!
//! Centralized error handling for the Confession Board crates.
//! Adapters map driver failures into these variants at the port boundary.

use thiserror::Error;

/// The primary error type for all cb-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Confession, Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Rejected before any I/O (e.g., empty content, oversized media)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Uniqueness violation reported by the store (e.g., identity id already taken)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached or failed transiently
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Local failure inside an adapter (e.g., I/O, encoding)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }
}

/// A specialized Result type for Confession Board logic.
pub type Result<T> = std::result::Result<T, AppError>;
