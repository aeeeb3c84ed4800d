//! In-memory implementation of the AuditLedger trait.
//!
//! Primarily for testing. Same append-only semantics as SQLite with no
//! persistence.

use std::sync::RwLock;

use async_trait::async_trait;

use medvault_core::RecordId;

use crate::asset::{AuditAsset, LedgerEntry, LedgerReceipt, TransactionId};
use crate::error::Result;
use crate::signing::LedgerKeypair;
use crate::traits::AuditLedger;

/// In-memory audit ledger.
///
/// Entries live in insertion order; nothing is ever removed or rewritten.
pub struct MemoryLedger {
    keypair: LedgerKeypair,
    inner: RwLock<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    entries: Vec<LedgerEntry>,
    next_tx: u64,
}

impl MemoryLedger {
    /// Create an empty ledger signing with the given keypair.
    pub fn new(keypair: LedgerKeypair) -> Self {
        Self {
            keypair,
            inner: RwLock::new(MemoryLedgerInner {
                entries: Vec::new(),
                next_tx: 1,
            }),
        }
    }

    /// Total number of entries appended.
    pub fn entry_count(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(LedgerKeypair::generate())
    }
}

#[async_trait]
impl AuditLedger for MemoryLedger {
    async fn create_asset(&self, asset: AuditAsset) -> Result<LedgerReceipt> {
        let mut inner = self.inner.write().unwrap();

        let transaction_id = TransactionId(inner.next_tx);
        inner.next_tx += 1;

        let entry = LedgerEntry::sign(asset, transaction_id, &self.keypair);
        let receipt = entry.receipt();
        inner.entries.push(entry);

        Ok(receipt)
    }

    async fn find_by_record_id(&self, record_id: &RecordId) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.asset.record_id == *record_id)
            .cloned()
            .collect())
    }
}
