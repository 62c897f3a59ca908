//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, plus the mapping from
//! core errors to HTTP responses used by every handler.

use axum::http::StatusCode;
use tracing::error;
use writing_coach_core::ports::PortError;
use writing_coach_core::vocabulary::DictionaryError;
use writing_coach_core::workflow::SubmissionError;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The HSK vocabulary file exists but could not be read or parsed.
    #[error("Vocabulary Error: {0}")]
    Vocabulary(#[from] DictionaryError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The error half of every handler's return type.
pub type HttpError = (StatusCode, String);

/// Maps a port error to a response. `Unexpected` details are logged, never returned.
pub fn port_error(e: PortError) -> HttpError {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Conflict(what) => (StatusCode::BAD_REQUEST, what),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(detail) => {
            error!("Unexpected port error: {}", detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

pub fn submission_error(e: SubmissionError) -> HttpError {
    match e {
        SubmissionError::Invalid(reason) => (StatusCode::UNPROCESSABLE_ENTITY, reason),
        SubmissionError::ScoringUnavailable(cause) => {
            error!("Essay scoring unavailable: {}", cause);
            (
                StatusCode::BAD_GATEWAY,
                "Essay scoring is currently unavailable, please try again later".to_string(),
            )
        }
        SubmissionError::ScoringFailed(cause) => {
            error!("Essay scoring failed: {}", cause);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error analyzing essay".to_string(),
            )
        }
        SubmissionError::Persistence(e) => port_error(e),
    }
}

pub fn forbidden() -> HttpError {
    (
        StatusCode::FORBIDDEN,
        "Not authorized to access this resource".to_string(),
    )
}
