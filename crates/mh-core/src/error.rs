//! # AppError
//!
//! Centralized error handling for the MemeHustle services.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Meme)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., blank title, malformed body)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Vote type other than "up" or "down"
    #[error("invalid vote type: {0:?}")]
    InvalidDirection(String),

    /// Bid credits that are not a positive integer
    #[error("invalid bid amount: {0} (credits must be positive)")]
    InvalidAmount(i64),

    /// Store unavailable or rejected the operation
    #[error("store fault: {0}")]
    StoreFault(String),

    /// External text generation failed. Absorbed by the caption generator.
    #[error("generation fault: {0}")]
    GenerationFault(String),
}

impl AppError {
    pub fn meme_not_found(id: impl ToString) -> Self {
        AppError::NotFound("meme".to_string(), id.to_string())
    }

    /// True for errors caused by the caller rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(..)
                | AppError::ValidationError(_)
                | AppError::InvalidDirection(_)
                | AppError::InvalidAmount(_)
        )
    }
}

/// Adapter errors surface from the ports as `anyhow::Error`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::StoreFault(format!("{err:#}"))
    }
}

/// A specialized Result type for MemeHustle logic.
pub type Result<T> = std::result::Result<T, AppError>;
