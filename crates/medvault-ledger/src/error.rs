//! Error types for the audit ledger.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Asset serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No ledger entry for the given key.
    #[error("ledger entry not found: {0}")]
    NotFound(String),

    /// A stored entry failed signature verification.
    #[error("invalid entry signature")]
    InvalidSignature,

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Backend temporarily unavailable.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Whether a retry with backoff can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io(_) | Self::Unavailable(_) => true,
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
