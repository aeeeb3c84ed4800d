//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur during key management and encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The system entropy source failed. Fatal, non-retryable.
    #[error("entropy source failure")]
    EntropyFailure,

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption failed: tag mismatch, malformed field, or bad key.
    #[error("decryption failed: {0}")]
    DecryptionError(String),

    /// Wrong passphrase for a wrapped private key.
    #[error("authentication failed")]
    AuthFailed,

    /// Package field has an invalid length or encoding.
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// Invalid key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key derivation error.
    #[error("key derivation error: {0}")]
    KeyDerivationError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
