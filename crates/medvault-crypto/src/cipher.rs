//! Hybrid envelope encryption of record payloads.
//!
//! One [`EncryptedPackage`] per record: the payload is sealed under a random
//! content key, and the content key is wrapped for a single recipient via
//! ephemeral X25519 agreement. Encrypt and decrypt are pure and stateless.

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::keys::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519SecretKey};

/// Additional authenticated data binding content ciphertexts to this system.
pub const CONTENT_AAD: &[u8] = b"medvault/record-content/v1";

/// Additional authenticated data for the content-key wrap layer.
pub const KEY_WRAP_AAD: &[u8] = b"medvault/content-key/v1";

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag length.
pub const TAG_LEN: usize = 16;

/// Content key length.
pub const KEY_LEN: usize = 32;

/// Total length of the `wrapped_content_key` field:
/// wrap nonce || wrapped key || tag.
const WRAPPED_KEY_LEN: usize = NONCE_LEN + KEY_LEN + TAG_LEN;

/// One envelope-encrypted payload. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPackage {
    /// Payload ciphertext (tag split off into `auth_tag`).
    pub ciphertext: Vec<u8>,

    /// Nonce for the content layer.
    pub nonce: EncryptionNonce,

    /// Authentication tag for the content layer.
    pub auth_tag: [u8; TAG_LEN],

    /// Content key wrapped under the derived key-encryption key.
    /// Layout: wrap nonce (12) || wrapped key (32) || tag (16).
    pub wrapped_content_key: Vec<u8>,

    /// Ephemeral X25519 public key (sender's side of ECDH).
    pub ephemeral_public: X25519PublicKey,
}

impl EncryptedPackage {
    /// Envelope-encrypt a plaintext for a recipient public key.
    pub fn encrypt(plaintext: &[u8], recipient: &X25519PublicKey) -> Result<Self> {
        // Content layer: random key, random nonce, AEAD with fixed AAD.
        let content_key = EncryptionKey::generate()?;
        let nonce = EncryptionNonce::generate()?;
        let mut sealed = content_key.encrypt(plaintext, &nonce, CONTENT_AAD)?;

        let tag_start = sealed.len() - TAG_LEN;
        let tag_bytes = sealed.split_off(tag_start);
        let mut auth_tag = [0u8; TAG_LEN];
        auth_tag.copy_from_slice(&tag_bytes);

        // Key wrap layer: ephemeral ECDH, KDF, AEAD.
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let shared = ephemeral.diffie_hellman(recipient);
        let kek = shared.derive_kek(ephemeral_public.as_bytes());

        let wrap_nonce = EncryptionNonce::generate()?;
        let wrapped = kek.encrypt(content_key.as_bytes(), &wrap_nonce, KEY_WRAP_AAD)?;

        let mut wrapped_content_key = Vec::with_capacity(WRAPPED_KEY_LEN);
        wrapped_content_key.extend_from_slice(wrap_nonce.as_bytes());
        wrapped_content_key.extend_from_slice(&wrapped);

        Ok(Self {
            ciphertext: sealed,
            nonce,
            auth_tag,
            wrapped_content_key,
            ephemeral_public,
        })
    }

    /// Decrypt this package with the recipient's private key.
    ///
    /// Any authentication-tag mismatch or malformed field fails with
    /// [`CryptoError::DecryptionError`]; partial output is never returned.
    pub fn decrypt(&self, recipient_secret: &X25519SecretKey) -> Result<Vec<u8>> {
        if self.wrapped_content_key.len() != WRAPPED_KEY_LEN {
            return Err(CryptoError::DecryptionError(format!(
                "wrapped content key must be {WRAPPED_KEY_LEN} bytes, got {}",
                self.wrapped_content_key.len()
            )));
        }

        let (nonce_bytes, wrapped) = self.wrapped_content_key.split_at(NONCE_LEN);
        let mut wrap_nonce = [0u8; NONCE_LEN];
        wrap_nonce.copy_from_slice(nonce_bytes);
        let wrap_nonce = EncryptionNonce::from_bytes(wrap_nonce);

        // Recompute the shared secret and re-derive the key-encryption key.
        let shared = recipient_secret.diffie_hellman(&self.ephemeral_public);
        let kek = shared.derive_kek(self.ephemeral_public.as_bytes());

        let key_bytes = kek.decrypt(wrapped, &wrap_nonce, KEY_WRAP_AAD)?;
        if key_bytes.len() != KEY_LEN {
            return Err(CryptoError::DecryptionError(format!(
                "unwrapped key must be {KEY_LEN} bytes, got {}",
                key_bytes.len()
            )));
        }
        let mut key_arr = [0u8; KEY_LEN];
        key_arr.copy_from_slice(&key_bytes);
        let content_key = EncryptionKey::from_bytes(key_arr);

        // Reassemble ciphertext || tag for the AEAD.
        let mut sealed = Vec::with_capacity(self.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&self.ciphertext);
        sealed.extend_from_slice(&self.auth_tag);

        content_key.decrypt(&sealed, &self.nonce, CONTENT_AAD)
    }

    /// Serialize to CBOR bytes for content-addressed storage.
    ///
    /// The encoding is deterministic for a given package, so storing the
    /// same package twice always lands at the same content address.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CryptoError::SerializationError(e.to_string()))
    }

    /// Convert to the all-hex wire shape.
    pub fn to_wire(&self) -> WirePackage {
        WirePackage {
            ciphertext: hex::encode(&self.ciphertext),
            iv: hex::encode(self.nonce.as_bytes()),
            auth_tag: hex::encode(self.auth_tag),
            wrapped_content_key: hex::encode(&self.wrapped_content_key),
            ephemeral_public_key: self.ephemeral_public.to_hex(),
        }
    }

    /// Parse from the wire shape, validating field lengths.
    pub fn from_wire(wire: &WirePackage) -> Result<Self> {
        let ciphertext =
            hex::decode(&wire.ciphertext).map_err(|e| malformed("ciphertext", &e.to_string()))?;

        let iv = hex::decode(&wire.iv).map_err(|e| malformed("iv", &e.to_string()))?;
        let iv: [u8; NONCE_LEN] = iv
            .try_into()
            .map_err(|_| malformed("iv", "expected 12 bytes"))?;

        let tag =
            hex::decode(&wire.auth_tag).map_err(|e| malformed("authTag", &e.to_string()))?;
        let auth_tag: [u8; TAG_LEN] = tag
            .try_into()
            .map_err(|_| malformed("authTag", "expected 16 bytes"))?;

        let wrapped_content_key = hex::decode(&wire.wrapped_content_key)
            .map_err(|e| malformed("wrappedContentKey", &e.to_string()))?;
        if wrapped_content_key.len() != WRAPPED_KEY_LEN {
            return Err(malformed(
                "wrappedContentKey",
                &format!("expected {WRAPPED_KEY_LEN} bytes"),
            ));
        }

        let ephemeral_public = X25519PublicKey::from_hex(&wire.ephemeral_public_key)
            .map_err(|e| malformed("ephemeralPublicKey", &e.to_string()))?;

        Ok(Self {
            ciphertext,
            nonce: EncryptionNonce::from_bytes(iv),
            auth_tag,
            wrapped_content_key,
            ephemeral_public,
        })
    }
}

/// The all-hex wire shape of an encrypted package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePackage {
    pub ciphertext: String,
    pub iv: String,
    pub auth_tag: String,
    pub wrapped_content_key: String,
    pub ephemeral_public_key: String,
}

fn malformed(field: &str, detail: &str) -> CryptoError {
    CryptoError::MalformedPackage(format!("{field}: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyManager;

    fn keypair() -> crate::keys::KeyPair {
        KeyManager::default().generate_keypair().unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let pair = keypair();
        let plaintext = br#"{"diagnosis":"flu","treatment":"rest"}"#;

        let package = EncryptedPackage::encrypt(plaintext, &pair.public).unwrap();
        let decrypted = package.decrypt(&pair.secret).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let pair = keypair();
        let package = EncryptedPackage::encrypt(b"", &pair.public).unwrap();
        assert_eq!(package.decrypt(&pair.secret).unwrap(), b"");
    }

    #[test]
    fn test_wrong_private_key_fails() {
        let pair = keypair();
        let other = keypair();

        let package = EncryptedPackage::encrypt(b"secret", &pair.public).unwrap();
        assert!(matches!(
            package.decrypt(&other.secret),
            Err(CryptoError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_ciphertext_bit_flip_detected() {
        let pair = keypair();
        let mut package = EncryptedPackage::encrypt(b"tamper target", &pair.public).unwrap();

        package.ciphertext[0] ^= 0x01;
        assert!(matches!(
            package.decrypt(&pair.secret),
            Err(CryptoError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_auth_tag_bit_flip_detected() {
        let pair = keypair();
        let mut package = EncryptedPackage::encrypt(b"tamper target", &pair.public).unwrap();

        package.auth_tag[15] ^= 0x80;
        assert!(matches!(
            package.decrypt(&pair.secret),
            Err(CryptoError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_wrapped_key_tamper_detected() {
        let pair = keypair();
        let mut package = EncryptedPackage::encrypt(b"tamper target", &pair.public).unwrap();

        let last = package.wrapped_content_key.len() - 1;
        package.wrapped_content_key[last] ^= 0x01;
        assert!(matches!(
            package.decrypt(&pair.secret),
            Err(CryptoError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_truncated_wrapped_key_rejected() {
        let pair = keypair();
        let mut package = EncryptedPackage::encrypt(b"x", &pair.public).unwrap();

        package.wrapped_content_key.truncate(10);
        assert!(matches!(
            package.decrypt(&pair.secret),
            Err(CryptoError::DecryptionError(_))
        ));
    }

    #[test]
    fn test_packages_unique_per_encryption() {
        // Fresh content key and nonce per call: same plaintext, different
        // ciphertext.
        let pair = keypair();
        let a = EncryptedPackage::encrypt(b"same input", &pair.public).unwrap();
        let b = EncryptedPackage::encrypt(b"same input", &pair.public).unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_cbor_roundtrip() {
        let pair = keypair();
        let package = EncryptedPackage::encrypt(b"persist me", &pair.public).unwrap();

        let bytes = package.to_bytes();
        let recovered = EncryptedPackage::from_bytes(&bytes).unwrap();
        assert_eq!(package, recovered);
        assert_eq!(recovered.decrypt(&pair.secret).unwrap(), b"persist me");
    }

    #[test]
    fn test_cbor_encoding_deterministic() {
        let pair = keypair();
        let package = EncryptedPackage::encrypt(b"dedup", &pair.public).unwrap();
        assert_eq!(package.to_bytes(), package.to_bytes());
    }

    #[test]
    fn test_wire_roundtrip() {
        let pair = keypair();
        let package = EncryptedPackage::encrypt(b"wire me", &pair.public).unwrap();

        let wire = package.to_wire();
        let recovered = EncryptedPackage::from_wire(&wire).unwrap();
        assert_eq!(package, recovered);
    }

    #[test]
    fn test_wire_json_field_names() {
        let pair = keypair();
        let wire = EncryptedPackage::encrypt(b"x", &pair.public).unwrap().to_wire();

        let json = serde_json::to_value(&wire).unwrap();
        for field in [
            "ciphertext",
            "iv",
            "authTag",
            "wrappedContentKey",
            "ephemeralPublicKey",
        ] {
            assert!(json.get(field).is_some(), "missing wire field {field}");
        }
    }

    #[test]
    fn test_wire_bad_hex_rejected() {
        let pair = keypair();
        let mut wire = EncryptedPackage::encrypt(b"x", &pair.public).unwrap().to_wire();
        wire.iv = "not-hex".into();
        assert!(matches!(
            EncryptedPackage::from_wire(&wire),
            Err(CryptoError::MalformedPackage(_))
        ));
    }

    #[test]
    fn test_wire_bad_length_rejected() {
        let pair = keypair();
        let mut wire = EncryptedPackage::encrypt(b"x", &pair.public).unwrap().to_wire();
        wire.auth_tag = "beef".into();
        assert!(matches!(
            EncryptedPackage::from_wire(&wire),
            Err(CryptoError::MalformedPackage(_))
        ));
    }
}
