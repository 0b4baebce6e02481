//! Error types for the history layer.

use thiserror::Error;

/// Result type alias for history operations
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Errors surfaced by history store implementations
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
