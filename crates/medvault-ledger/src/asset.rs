//! Audit assets: the atomic unit of the audit trail.
//!
//! An asset is immutable once appended. Changes to a record are new assets;
//! nothing is ever rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use medvault_core::{ActorId, AuditAction, DataHash, RecordId};

use crate::error::{LedgerError, Result};
use crate::signing::{LedgerKeypair, LedgerPublicKey, LedgerSignature};

/// One creation/access event against a record.
///
/// `data_hash` is the canonical plaintext digest for `create` assets and the
/// zero hash for plain access events, which carry no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAsset {
    pub record_id: RecordId,
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub data_hash: DataHash,
    pub timestamp: DateTime<Utc>,
}

impl AuditAsset {
    /// Build an asset stamped with the current time.
    pub fn new(
        record_id: RecordId,
        actor_id: ActorId,
        action: AuditAction,
        data_hash: DataHash,
    ) -> Self {
        Self {
            record_id,
            actor_id,
            action,
            data_hash,
            timestamp: Utc::now(),
        }
    }

    /// Canonical CBOR encoding; the bytes that get signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).expect("CBOR serialization failed");
        buf
    }

    /// Decode from canonical bytes.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| LedgerError::Serialization(e.to_string()))
    }
}

/// Content-addressed identifier of a signed asset.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(pub [u8; 32]);

impl AssetId {
    /// Compute the id of a signed asset: Blake3 over canonical bytes plus
    /// signature.
    pub fn compute(canonical: &[u8], signature: &LedgerSignature) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(canonical);
        hasher.update(signature.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

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
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for AssetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Monotonically increasing ledger position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// What a caller gets back from appending an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub transaction_id: TransactionId,
    pub asset_id: AssetId,
}

/// A signed, sequenced asset as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub asset_id: AssetId,
    pub asset: AuditAsset,
    pub author: LedgerPublicKey,
    pub signature: LedgerSignature,
}

impl LedgerEntry {
    /// Sign an asset into a new entry at the given ledger position.
    pub fn sign(asset: AuditAsset, transaction_id: TransactionId, keypair: &LedgerKeypair) -> Self {
        let canonical = asset.canonical_bytes();
        let signature = keypair.sign(&canonical);
        let asset_id = AssetId::compute(&canonical, &signature);
        Self {
            transaction_id,
            asset_id,
            asset,
            author: keypair.public_key(),
            signature,
        }
    }

    /// Verify signature and id consistency of this entry.
    pub fn verify(&self) -> Result<()> {
        let canonical = self.asset.canonical_bytes();
        self.author.verify(&canonical, &self.signature)?;
        if AssetId::compute(&canonical, &self.signature) != self.asset_id {
            return Err(LedgerError::InvalidSignature);
        }
        Ok(())
    }

    /// The receipt for this entry.
    pub fn receipt(&self) -> LedgerReceipt {
        LedgerReceipt {
            transaction_id: self.transaction_id,
            asset_id: self.asset_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_asset() -> AuditAsset {
        AuditAsset::new(
            RecordId::generate(),
            ActorId::from("doctor-17"),
            AuditAction::Create,
            DataHash::hash(b"plaintext"),
        )
    }

    #[test]
    fn test_canonical_roundtrip() {
        let asset = sample_asset();
        let bytes = asset.canonical_bytes();
        let recovered = AuditAsset::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(asset, recovered);
    }

    #[test]
    fn test_canonical_deterministic() {
        let asset = sample_asset();
        assert_eq!(asset.canonical_bytes(), asset.canonical_bytes());
    }

    #[test]
    fn test_entry_sign_verify() {
        let keypair = LedgerKeypair::generate();
        let entry = LedgerEntry::sign(sample_asset(), TransactionId(1), &keypair);
        entry.verify().unwrap();
    }

    #[test]
    fn test_tampered_asset_fails_verify() {
        let keypair = LedgerKeypair::generate();
        let mut entry = LedgerEntry::sign(sample_asset(), TransactionId(1), &keypair);
        entry.asset.actor_id = ActorId::from("someone-else");
        assert!(entry.verify().is_err());
    }

    #[test]
    fn test_asset_id_binds_signature() {
        let keypair = LedgerKeypair::generate();
        let asset = sample_asset();
        let e1 = LedgerEntry::sign(asset.clone(), TransactionId(1), &keypair);
        let e2 = LedgerEntry::sign(asset, TransactionId(2), &keypair);
        // Same asset, same signature bytes, same id regardless of position.
        assert_eq!(e1.asset_id, e2.asset_id);
    }

    #[test]
    fn test_wire_shape_fields() {
        let asset = sample_asset();
        let json = serde_json::to_value(&asset).unwrap();
        for field in ["recordId", "actorId", "action", "dataHash", "timestamp"] {
            assert!(json.get(field).is_some(), "missing wire field {field}");
        }
        // RFC 3339 timestamp on the wire.
        let ts = json["timestamp"].as_str().unwrap();
        assert!(ts.contains('T'));
    }
}
