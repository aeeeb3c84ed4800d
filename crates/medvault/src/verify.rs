//! Integrity verification against the audit ledger.
//!
//! Recomputes the canonical hash of a candidate plaintext and compares it
//! with the hash the ledger recorded when the record was created. A mismatch
//! is a business event - the record may have been tampered with - so it
//! comes back as a result value, never an error.

use std::sync::Arc;

use serde_json::Value;

use medvault_core::{hash_value, AuditAction, DataHash, RecordId};
use medvault_ledger::AuditLedger;

use crate::error::Result;

/// Outcome of an integrity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Candidate hash equals the ledger-recorded hash.
    Match,
    /// Hashes disagree; the caller decides how to react.
    Mismatch {
        expected: DataHash,
        actual: DataHash,
    },
    /// The ledger has no `create` asset for this record.
    NotFound,
}

/// Recomputes and compares content hashes against ledger history.
pub struct IntegrityVerifier<L> {
    ledger: Arc<L>,
}

impl<L: AuditLedger> IntegrityVerifier<L> {
    /// Build a verifier over a ledger.
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// Compare a candidate plaintext with the record's original hash.
    ///
    /// Uses the earliest `create` asset; later access entries carry no
    /// plaintext digest. Only ledger I/O failures surface as errors.
    pub async fn verify(&self, record_id: &RecordId, candidate: &Value) -> Result<VerifyOutcome> {
        let entries = self.ledger.find_by_record_id(record_id).await?;

        let Some(create) = entries
            .iter()
            .find(|e| e.asset.action == AuditAction::Create)
        else {
            return Ok(VerifyOutcome::NotFound);
        };

        let expected = create.asset.data_hash;
        let actual = hash_value(candidate);

        if expected == actual {
            Ok(VerifyOutcome::Match)
        } else {
            tracing::warn!(
                record_id = %record_id,
                expected = %expected.to_hex(),
                actual = %actual.to_hex(),
                "integrity mismatch"
            );
            Ok(VerifyOutcome::Mismatch { expected, actual })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::ActorId;
    use medvault_ledger::{AuditAsset, LedgerKeypair, MemoryLedger};
    use serde_json::json;

    async fn ledger_with_create(record_id: RecordId, body: &Value) -> Arc<MemoryLedger> {
        let ledger = Arc::new(MemoryLedger::new(LedgerKeypair::generate()));
        ledger
            .create_asset(AuditAsset::new(
                record_id,
                ActorId::from("author"),
                AuditAction::Create,
                hash_value(body),
            ))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_match() {
        let record_id = RecordId::generate();
        let body = json!({"diagnosis": "flu"});
        let verifier = IntegrityVerifier::new(ledger_with_create(record_id, &body).await);

        // Same fields, different construction order.
        let candidate = json!({"diagnosis": "flu"});
        assert_eq!(
            verifier.verify(&record_id, &candidate).await.unwrap(),
            VerifyOutcome::Match
        );
    }

    #[tokio::test]
    async fn test_mismatch_is_a_value_not_an_error() {
        let record_id = RecordId::generate();
        let body = json!({"diagnosis": "flu"});
        let verifier = IntegrityVerifier::new(ledger_with_create(record_id, &body).await);

        let outcome = verifier
            .verify(&record_id, &json!({"diagnosis": "cold"}))
            .await
            .unwrap();
        assert!(matches!(outcome, VerifyOutcome::Mismatch { .. }));
    }

    #[tokio::test]
    async fn test_unknown_record_not_found() {
        let ledger = Arc::new(MemoryLedger::new(LedgerKeypair::generate()));
        let verifier = IntegrityVerifier::new(ledger);

        let outcome = verifier
            .verify(&RecordId::generate(), &json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(outcome, VerifyOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_uses_earliest_create_asset() {
        let record_id = RecordId::generate();
        let body = json!({"diagnosis": "flu"});
        let ledger = ledger_with_create(record_id, &body).await;

        // A later read entry with the zero hash must not shadow the create.
        ledger
            .create_asset(AuditAsset::new(
                record_id,
                ActorId::from("reader"),
                AuditAction::Read,
                DataHash::ZERO,
            ))
            .await
            .unwrap();

        let verifier = IntegrityVerifier::new(ledger);
        assert_eq!(
            verifier.verify(&record_id, &body).await.unwrap(),
            VerifyOutcome::Match
        );
    }
}
