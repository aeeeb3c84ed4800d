//! # Medvault Crypto
//!
//! Key management and hybrid envelope encryption for health record payloads.
//!
//! ## Overview
//!
//! Every record payload is encrypted once with a random content key
//! (ChaCha20-Poly1305), and the content key is wrapped for the recipient via
//! X25519 key agreement. The ECDH shared secret is never used directly: it
//! always passes through a Blake3 key-derivation step before becoming a
//! key-encryption key. Both layers are authenticated, so tampering with the
//! ciphertext or the wrapped key is detected at decryption time.
//!
//! ## Key Types
//!
//! - [`KeyManager`] - Issues key pairs and protects private keys at rest
//! - [`KeyPair`] / [`X25519PublicKey`] / [`X25519SecretKey`] - Identity keys
//! - [`WrappedKey`] - A private key enveloped under a passphrase-derived key
//! - [`EncryptedPackage`] - One envelope-encrypted payload
//! - [`WirePackage`] - The all-hex wire shape of an encrypted package

pub mod cipher;
pub mod error;
pub mod keys;

pub use cipher::{EncryptedPackage, WirePackage, CONTENT_AAD, KEY_WRAP_AAD};
pub use error::{CryptoError, Result};
pub use keys::{
    Argon2Params, EncryptionKey, EncryptionNonce, EphemeralKeyPair, KeyManager, KeyPair,
    SharedKey, WrappedKey, X25519PublicKey, X25519SecretKey,
};
