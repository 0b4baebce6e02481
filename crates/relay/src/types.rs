//! Error types for the relay.

use thiserror::Error;

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised while processing relay events.
///
/// Every failure is handled locally within the relay; nothing here ever
/// propagates to other connections.
#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("a room key was supplied without an identity")]
    AnonymousJoin,
}
