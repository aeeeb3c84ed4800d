//! Key management: X25519 identity keys, key agreement, and at-rest
//! protection of private keys.
//!
//! Private keys are never persisted in cleartext. [`KeyManager::wrap_secret_key`]
//! envelopes them under an Argon2id passphrase-derived key with authenticated
//! encryption, so a wrong passphrase fails cleanly instead of yielding garbage
//! key material.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::error::{CryptoError, Result};

/// Domain separation for wrapping identity private keys at rest.
const IDENTITY_WRAP_AAD: &[u8] = b"medvault/wrapped-identity-key/v1";

/// Blake3 derive_key context for key-encryption keys.
const KEK_CONTEXT: &str = "medvault-crypto-v1-key-encryption";

/// An X25519 public key (32 bytes), hex-encoded on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("expected 32 bytes".into()))?;
        Ok(Self(arr))
    }

    /// Convert to x25519-dalek PublicKey.
    pub fn to_dalek(&self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl fmt::Debug for X25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519Pub({})", &self.to_hex()[..16])
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(*pk.as_bytes())
    }
}

/// An X25519 static secret key, owned by exactly one user identity.
///
/// Only for key agreement, never signing. The inner secret zeroizes on drop.
pub struct X25519SecretKey(StaticSecret);

impl X25519SecretKey {
    /// Create from seed bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// Get the raw secret bytes. Handle with care.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut bytes = hex::decode(s).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            bytes.zeroize();
            return Err(CryptoError::InvalidKey("expected 32 bytes".into()));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        bytes.zeroize();
        let secret = Self(StaticSecret::from(arr));
        arr.zeroize();
        Ok(secret)
    }

    /// Derive the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    /// Perform key agreement with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &X25519PublicKey) -> SharedKey {
        let shared = self.0.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

impl fmt::Debug for X25519SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X25519Secret({:?})", self.public_key())
    }
}

/// An asymmetric key pair for one user identity.
pub struct KeyPair {
    pub public: X25519PublicKey,
    pub secret: X25519SecretKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({:?})", self.public)
    }
}

/// A shared secret derived from X25519 key agreement.
///
/// Never used directly as a symmetric key; always passed through
/// [`SharedKey::derive_kek`] first. Zeroized on drop.
pub struct SharedKey([u8; 32]);

impl SharedKey {
    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a key-encryption key from this shared secret.
    ///
    /// The context binds the derived key to one specific envelope (e.g. the
    /// ephemeral public key), so the same pair of identities never reuses a
    /// key-encryption key across packages.
    pub fn derive_kek(&self, context: &[u8]) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(KEK_CONTEXT);
        hasher.update(&self.0);
        hasher.update(context);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A 256-bit symmetric key for ChaCha20-Poly1305. Zeroized on drop.
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Generate a new random key.
    ///
    /// Fails only if the OS entropy source fails.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| CryptoError::EntropyFailure)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt with this key. Output is ciphertext with the 16-byte
    /// authentication tag appended.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))?;
        cipher
            .encrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| CryptoError::EncryptionError(e.to_string()))
    }

    /// Decrypt with this key. Fails on any tag mismatch.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| CryptoError::DecryptionError(e.to_string()))?;
        cipher
            .decrypt(
                Nonce::from_slice(&nonce.0),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionError("authentication failed".into()))
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    /// Generate a new random nonce.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 12];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|_| CryptoError::EntropyFailure)?;
        Ok(Self(bytes))
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

/// Ephemeral key pair for one-time key agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    /// Generate a new ephemeral key pair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(PublicKey::from(&secret));
        Self { secret, public }
    }

    /// Get the public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Perform key agreement with a peer's public key.
    ///
    /// Consumes the ephemeral secret (can only be used once).
    pub fn diffie_hellman(self, peer_public: &X25519PublicKey) -> SharedKey {
        let shared = self.secret.diffie_hellman(&peer_public.to_dalek());
        SharedKey(*shared.as_bytes())
    }
}

/// Argon2id cost parameters for passphrase-derived keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2Params {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            m_cost: 65536,
            t_cost: 3,
            p_cost: 4,
        }
    }
}

/// A private key enveloped under a passphrase-derived key.
///
/// Carries everything needed to unwrap it again: KDF parameters, salt, and
/// nonce. The ciphertext includes the authentication tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub kdf: Argon2Params,
    pub salt: [u8; 32],
    pub nonce: EncryptionNonce,
    pub ciphertext: Vec<u8>,
}

/// Issues asymmetric key pairs and manages at-rest protection of private
/// keys.
///
/// Constructed explicitly and injected where needed; holds only KDF
/// configuration, no key material.
#[derive(Debug, Clone)]
pub struct KeyManager {
    kdf: Argon2Params,
}

impl KeyManager {
    /// Create a key manager with the given KDF parameters.
    pub fn new(kdf: Argon2Params) -> Self {
        Self { kdf }
    }

    /// Produce a fresh asymmetric key pair.
    ///
    /// Fails only on entropy-source failure.
    pub fn generate_keypair(&self) -> Result<KeyPair> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| CryptoError::EntropyFailure)?;
        let secret = X25519SecretKey::from_bytes(seed);
        seed.zeroize();
        let public = secret.public_key();
        Ok(KeyPair { public, secret })
    }

    /// Envelope a private key under a passphrase-derived key.
    pub fn wrap_secret_key(&self, secret: &X25519SecretKey, passphrase: &str) -> Result<WrappedKey> {
        let mut salt = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| CryptoError::EntropyFailure)?;
        let nonce = EncryptionNonce::generate()?;

        let wrap_key = derive_passphrase_key(passphrase, &salt, &self.kdf)?;
        let mut secret_bytes = secret.to_bytes();
        let ciphertext = wrap_key.encrypt(&secret_bytes, &nonce, IDENTITY_WRAP_AAD)?;
        secret_bytes.zeroize();

        Ok(WrappedKey {
            kdf: self.kdf.clone(),
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Recover a private key from its wrapped form.
    ///
    /// A wrong passphrase fails with [`CryptoError::AuthFailed`]; it never
    /// yields partially decrypted key material.
    pub fn unwrap_secret_key(&self, wrapped: &WrappedKey, passphrase: &str) -> Result<X25519SecretKey> {
        let wrap_key = derive_passphrase_key(passphrase, &wrapped.salt, &wrapped.kdf)?;
        let mut key_bytes = wrap_key
            .decrypt(&wrapped.ciphertext, &wrapped.nonce, IDENTITY_WRAP_AAD)
            .map_err(|_| CryptoError::AuthFailed)?;

        if key_bytes.len() != 32 {
            key_bytes.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 key bytes, got {}",
                key_bytes.len()
            )));
        }

        let mut arr = [0u8; 32];
        arr.copy_from_slice(&key_bytes);
        key_bytes.zeroize();
        let secret = X25519SecretKey::from_bytes(arr);
        arr.zeroize();
        Ok(secret)
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new(Argon2Params::default())
    }
}

/// Derive a symmetric key from a passphrase with Argon2id.
fn derive_passphrase_key(
    passphrase: &str,
    salt: &[u8; 32],
    params: &Argon2Params,
) -> Result<EncryptionKey> {
    let argon_params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(32))
        .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = [0u8; 32];
    argon
        .hash_password_into(passphrase.as_bytes(), salt, &mut out)
        .map_err(|e| CryptoError::KeyDerivationError(e.to_string()))?;
    let key = EncryptionKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
