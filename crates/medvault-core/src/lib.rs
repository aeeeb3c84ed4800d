//! # Medvault Core
//!
//! Pure primitives for the medvault record pipeline: identifiers, digests,
//! audit actions, and canonical plaintext serialization.
//!
//! This crate contains no I/O, no storage, no networking. It is pure
//! computation over record data.
//!
//! ## Key Types
//!
//! - [`RecordId`] - Identifier minted once per logical health record
//! - [`DataHash`] - Blake3 digest of the canonical plaintext
//! - [`ContentAddress`] - Blake3 digest of ciphertext bytes (storage key)
//! - [`AuditAction`] - Discriminator for audit trail entries
//!
//! ## Canonicalization
//!
//! Plaintext record bodies are JSON values. [`canonical_bytes`] produces a
//! deterministic encoding (recursively sorted object keys) so that the same
//! logical record always hashes to the same [`DataHash`], independent of how
//! the value was constructed. See [`canonical`] module.

pub mod canonical;
pub mod error;
pub mod types;

pub use canonical::{canonical_bytes, hash_value};
pub use error::CoreError;
pub use types::{ActorId, AuditAction, ContentAddress, DataHash, RecordId};
