//! AuditLedger trait: the capability interface for append-only audit stores.
//!
//! Anything immutable and append-only with a `create_asset` /
//! `find_by_record_id` contract satisfies it; the pipeline does not care
//! whether entries land in SQLite, a distributed ledger, or memory.

use async_trait::async_trait;
use medvault_core::RecordId;

use crate::asset::{AuditAsset, LedgerEntry, LedgerReceipt};
use crate::error::Result;

/// The AuditLedger trait: async interface for the audit trail.
///
/// # Design Notes
///
/// - **Append-only**: there is no update or delete operation, by design.
///   Corrections are new assets.
/// - **Global order**: every append receives a monotonically increasing
///   transaction id; `find_by_record_id` returns entries in that order.
/// - **Tamper evidence**: entries are signed over their canonical encoding
///   and can be re-verified at any time via [`LedgerEntry::verify`].
#[async_trait]
pub trait AuditLedger: Send + Sync {
    /// Append an immutable asset, returning its transaction and asset ids.
    async fn create_asset(&self, asset: AuditAsset) -> Result<LedgerReceipt>;

    /// All entries for a record, in ledger order.
    ///
    /// Returns an empty vec for unknown records.
    async fn find_by_record_id(&self, record_id: &RecordId) -> Result<Vec<LedgerEntry>>;
}
