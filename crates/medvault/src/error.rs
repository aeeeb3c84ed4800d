//! Error types for the record pipeline.

use thiserror::Error;

use medvault_core::RecordId;
use medvault_crypto::CryptoError;
use medvault_ledger::LedgerError;
use medvault_store::StoreError;

use crate::repository::RepositoryError;

/// Errors that can occur during pipeline operations.
///
/// Taxonomy follows the saga's propagation policy: validation and crypto
/// failures are surfaced immediately and never retried; store/ledger
/// failures are retried while transient, then escalate to the
/// `*Unavailable` variants when the retry budget is exhausted.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input. Non-retryable, surfaced to the caller immediately.
    #[error("validation error: {0}")]
    Validation(String),

    /// Key or encryption failure, including decryption tag mismatches.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Content store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Audit ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Metadata repository error.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The record's lock is held by another in-flight saga.
    #[error("record {0} is busy")]
    Busy(RecordId),

    /// A bounded I/O call did not complete in time.
    #[error("operation timed out: {0}")]
    Timeout(&'static str),

    /// Content store retry budget exhausted; the saga aborted.
    #[error("content store unavailable: {0}")]
    StoreUnavailable(String),

    /// Ledger retry budget exhausted; the saga aborted.
    #[error("audit ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// No visible record under this id.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// Caller is not in the record's authorized set.
    #[error("not authorized: {0}")]
    NotAuthorized(String),
}

impl PipelineError {
    /// Whether a retry with backoff can reasonably succeed.
    ///
    /// Authentication and validation failures are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Ledger(e) => e.is_transient(),
            Self::Repository(e) => e.is_transient(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// The generic outcome shown to end users for creation failures.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "you are not authorized to access this record",
            Self::NotFound(_) => "record not found",
            _ => "could not create a verifiable record, retry later",
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
