//! Error types for medvault core primitives.

use thiserror::Error;

/// Errors from parsing or validating core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("malformed value: {0}")]
    MalformedValue(String),
}
