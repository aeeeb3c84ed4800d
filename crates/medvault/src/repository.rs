//! Metadata repository: the pipeline's contract with the primary datastore.
//!
//! The surrounding application owns plain metadata rows; the pipeline only
//! needs four operations against them. Rows move `Pending -> Finalized` or
//! `Pending -> Failed`, and only finalized rows carry ciphertext references,
//! so a half-written record can never leak storage locations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

use medvault_core::{ActorId, ContentAddress, DataHash, RecordId};
use medvault_ledger::TransactionId;

/// Lifecycle state of a metadata row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Finalized,
    Failed,
}

/// The doctor a record is attributed to.
///
/// Manual uploads reference an external practitioner by name instead of an
/// in-system identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DoctorRef {
    Internal(ActorId),
    External { name: String, hospital: String },
}

/// The reference triple attached to a row at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedRefs {
    pub content_address: ContentAddress,
    pub ledger_tx: TransactionId,
    pub data_hash: DataHash,
}

/// One health record's metadata row.
///
/// The `(content_address, ledger_tx, data_hash)` triple is `Some` iff the
/// row is finalized. `reserved_at` lets an external sweep treat stale
/// reservations as failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecordMetadata {
    pub record_id: RecordId,
    pub student_id: ActorId,
    pub doctor: DoctorRef,
    pub status: RecordStatus,
    pub reserved_at: DateTime<Utc>,
    pub is_encrypted: bool,
    pub authorized_users: Vec<ActorId>,
    pub content_address: Option<ContentAddress>,
    pub ledger_tx: Option<TransactionId>,
    pub data_hash: Option<DataHash>,
}

impl HealthRecordMetadata {
    /// Build a fresh pending row with no ciphertext references.
    pub fn reserve(
        record_id: RecordId,
        student_id: ActorId,
        doctor: DoctorRef,
        authorized_users: Vec<ActorId>,
    ) -> Self {
        Self {
            record_id,
            student_id,
            doctor,
            status: RecordStatus::Pending,
            reserved_at: Utc::now(),
            is_encrypted: false,
            authorized_users,
            content_address: None,
            ledger_tx: None,
            data_hash: None,
        }
    }

    /// Whether read APIs may see this row.
    pub fn is_visible(&self) -> bool {
        self.status == RecordStatus::Finalized
    }
}

/// Errors from the metadata repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A row for this record id already exists.
    #[error("record already reserved: {0}")]
    AlreadyReserved(RecordId),

    /// No row for this record id.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The requested transition is not legal from the row's current state.
    #[error("invalid transition for {record_id}: {detail}")]
    InvalidTransition { record_id: RecordId, detail: String },

    /// Backend temporarily unavailable.
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Whether a retry with backoff can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// The four operations the pipeline needs from the primary datastore.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Insert a fresh pending row.
    ///
    /// Reserving over a failed row resets it to pending - that is the
    /// whole-saga retry path, which must reuse the original record id.
    /// Reserving over a pending or finalized row fails.
    async fn reserve(&self, metadata: HealthRecordMetadata) -> Result<(), RepositoryError>;

    /// Atomically move a pending row to finalized with its reference triple.
    async fn finalize(
        &self,
        record_id: &RecordId,
        refs: FinalizedRefs,
    ) -> Result<HealthRecordMetadata, RepositoryError>;

    /// Move a pending row to failed. Idempotent on already-failed rows.
    async fn mark_failed(&self, record_id: &RecordId) -> Result<(), RepositoryError>;

    /// Fetch a row by id, in whatever state it is in.
    async fn get(&self, record_id: &RecordId)
        -> Result<Option<HealthRecordMetadata>, RepositoryError>;
}

/// In-memory repository implementation.
///
/// Used by tests and as the substitutable default; the production deployment
/// implements [`MetadataRepository`] over its own datastore.
pub struct MemoryRepository {
    rows: RwLock<HashMap<RecordId, HealthRecordMetadata>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataRepository for MemoryRepository {
    async fn reserve(&self, metadata: HealthRecordMetadata) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().unwrap();
        match rows.get(&metadata.record_id) {
            Some(existing) if existing.status != RecordStatus::Failed => {
                return Err(RepositoryError::AlreadyReserved(metadata.record_id));
            }
            _ => {}
        }
        rows.insert(metadata.record_id, metadata);
        Ok(())
    }

    async fn finalize(
        &self,
        record_id: &RecordId,
        refs: FinalizedRefs,
    ) -> Result<HealthRecordMetadata, RepositoryError> {
        let mut rows = self.rows.write().unwrap();
        let row = rows
            .get_mut(record_id)
            .ok_or(RepositoryError::NotFound(*record_id))?;

        if row.status != RecordStatus::Pending {
            return Err(RepositoryError::InvalidTransition {
                record_id: *record_id,
                detail: format!("cannot finalize from {:?}", row.status),
            });
        }

        row.status = RecordStatus::Finalized;
        row.is_encrypted = true;
        row.content_address = Some(refs.content_address);
        row.ledger_tx = Some(refs.ledger_tx);
        row.data_hash = Some(refs.data_hash);
        Ok(row.clone())
    }

    async fn mark_failed(&self, record_id: &RecordId) -> Result<(), RepositoryError> {
        let mut rows = self.rows.write().unwrap();
        let row = rows
            .get_mut(record_id)
            .ok_or(RepositoryError::NotFound(*record_id))?;

        match row.status {
            RecordStatus::Pending => {
                row.status = RecordStatus::Failed;
                Ok(())
            }
            RecordStatus::Failed => Ok(()),
            RecordStatus::Finalized => Err(RepositoryError::InvalidTransition {
                record_id: *record_id,
                detail: "cannot fail a finalized record".into(),
            }),
        }
    }

    async fn get(
        &self,
        record_id: &RecordId,
    ) -> Result<Option<HealthRecordMetadata>, RepositoryError> {
        Ok(self.rows.read().unwrap().get(record_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_row(record_id: RecordId) -> HealthRecordMetadata {
        HealthRecordMetadata::reserve(
            record_id,
            ActorId::from("student-1"),
            DoctorRef::Internal(ActorId::from("doctor-1")),
            vec![ActorId::from("doctor-1")],
        )
    }

    fn refs() -> FinalizedRefs {
        FinalizedRefs {
            content_address: ContentAddress::compute(b"blob"),
            ledger_tx: TransactionId(1),
            data_hash: DataHash::hash(b"plain"),
        }
    }

    #[tokio::test]
    async fn test_reserve_then_finalize() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();

        let pending = repo.get(&record_id).await.unwrap().unwrap();
        assert_eq!(pending.status, RecordStatus::Pending);
        assert!(pending.content_address.is_none());
        assert!(!pending.is_visible());

        let finalized = repo.finalize(&record_id, refs()).await.unwrap();
        assert_eq!(finalized.status, RecordStatus::Finalized);
        assert!(finalized.is_encrypted);
        assert!(finalized.content_address.is_some());
        assert!(finalized.ledger_tx.is_some());
        assert!(finalized.data_hash.is_some());
        assert!(finalized.is_visible());
    }

    #[tokio::test]
    async fn test_double_reserve_rejected() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();
        assert!(matches!(
            repo.reserve(pending_row(record_id)).await,
            Err(RepositoryError::AlreadyReserved(_))
        ));
    }

    #[tokio::test]
    async fn test_reserve_over_failed_row_resets_to_pending() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();
        repo.mark_failed(&record_id).await.unwrap();

        // Whole-saga retry under the same id.
        repo.reserve(pending_row(record_id)).await.unwrap();
        let row = repo.get(&record_id).await.unwrap().unwrap();
        assert_eq!(row.status, RecordStatus::Pending);

        repo.finalize(&record_id, refs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_failed_idempotent() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();
        repo.mark_failed(&record_id).await.unwrap();
        repo.mark_failed(&record_id).await.unwrap();

        let row = repo.get(&record_id).await.unwrap().unwrap();
        assert_eq!(row.status, RecordStatus::Failed);
        assert!(row.content_address.is_none());
    }

    #[tokio::test]
    async fn test_finalize_failed_row_rejected() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();
        repo.mark_failed(&record_id).await.unwrap();
        assert!(matches!(
            repo.finalize(&record_id, refs()).await,
            Err(RepositoryError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_finalized_row_rejected() {
        let repo = MemoryRepository::new();
        let record_id = RecordId::generate();

        repo.reserve(pending_row(record_id)).await.unwrap();
        repo.finalize(&record_id, refs()).await.unwrap();
        assert!(matches!(
            repo.mark_failed(&record_id).await,
            Err(RepositoryError::InvalidTransition { .. })
        ));
    }
}
