//! The record pipeline: one saga from plaintext to a finalized, verifiable
//! record.
//!
//! The pipeline is the only entry point the surrounding application uses.
//! It owns no storage itself; repository, content store, and ledger are
//! injected at startup so deployments and tests can substitute backends
//! freely.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use medvault_core::{canonical_bytes, hash_value, ActorId, AuditAction, ContentAddress, RecordId};
use medvault_crypto::{EncryptedPackage, X25519PublicKey, X25519SecretKey};
use medvault_ledger::{AccessLogger, AuditAsset, AuditLedger, LedgerReceipt};
use medvault_store::ContentStore;

use crate::error::{PipelineError, Result};
use crate::locks::LockTable;
use crate::repository::{DoctorRef, FinalizedRefs, HealthRecordMetadata, MetadataRepository};
use crate::retry::{retry_transient, RetryPolicy};
use crate::verify::{IntegrityVerifier, VerifyOutcome};

/// Configuration for the pipeline's bounded I/O.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Timeout applied to each content store / ledger call.
    pub io_timeout: Duration,
    /// Retry budget for transient store / ledger failures.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            io_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Saga states for one logical record.
///
/// `Failed` is terminal and reachable from any intermediate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Reserved,
    Encrypting,
    Stored,
    Logged,
    Finalized,
    Failed,
}

impl SagaState {
    /// Whether the saga can make no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Failed)
    }
}

/// Input for creating one encrypted record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub student_id: ActorId,
    pub doctor: DoctorRef,
    pub authorized_users: Vec<ActorId>,
    /// The plaintext record body (diagnosis, treatment, ...).
    pub body: Value,
}

/// Orchestrates encrypt -> store -> log -> finalize across the injected
/// backends.
pub struct RecordPipeline<R, S, L> {
    repository: Arc<R>,
    store: Arc<S>,
    ledger: Arc<L>,
    access_log: AccessLogger<L>,
    locks: LockTable,
    config: PipelineConfig,
}

impl<R, S, L> RecordPipeline<R, S, L>
where
    R: MetadataRepository,
    S: ContentStore,
    L: AuditLedger,
{
    /// Wire up a pipeline from its collaborators.
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        ledger: Arc<L>,
        config: PipelineConfig,
    ) -> Self {
        let access_log = AccessLogger::new(Arc::clone(&ledger));
        Self {
            repository,
            store,
            ledger,
            access_log,
            locks: LockTable::new(),
            config,
        }
    }

    /// The best-effort access logger (exposed for queue flushing).
    pub fn access_log(&self) -> &AccessLogger<L> {
        &self.access_log
    }

    /// An integrity verifier sharing this pipeline's ledger.
    pub fn verifier(&self) -> IntegrityVerifier<L> {
        IntegrityVerifier::new(Arc::clone(&self.ledger))
    }

    /// Create an encrypted record under a freshly minted id.
    pub async fn create_encrypted_record(
        &self,
        request: NewRecord,
        author: &ActorId,
        recipient: &X25519PublicKey,
    ) -> Result<HealthRecordMetadata> {
        self.create_encrypted_record_with_id(RecordId::generate(), request, author, recipient)
            .await
    }

    /// Create an encrypted record under a caller-supplied id.
    ///
    /// Whole-saga retries must reuse the id minted on the first attempt so
    /// a transient failure never strands orphaned ledger or storage entries
    /// under a different record. Concurrent sagas for the same id are
    /// rejected with [`PipelineError::Busy`].
    pub async fn create_encrypted_record_with_id(
        &self,
        record_id: RecordId,
        request: NewRecord,
        author: &ActorId,
        recipient: &X25519PublicKey,
    ) -> Result<HealthRecordMetadata> {
        validate_request(&request)?;

        // Held for the saga's duration; released on every exit path below.
        let _guard = self
            .locks
            .try_acquire(record_id)
            .ok_or(PipelineError::Busy(record_id))?;

        let row = HealthRecordMetadata::reserve(
            record_id,
            request.student_id.clone(),
            request.doctor.clone(),
            request.authorized_users.clone(),
        );
        self.repository.reserve(row).await?;
        tracing::info!(record_id = %record_id, state = ?SagaState::Reserved, "record reserved");

        match self.run_saga(record_id, &request, author, recipient).await {
            Ok(metadata) => Ok(metadata),
            Err(err) => {
                tracing::warn!(
                    record_id = %record_id,
                    state = ?SagaState::Failed,
                    error = %err,
                    "saga failed, marking record failed"
                );
                if let Err(mark_err) = self.repository.mark_failed(&record_id).await {
                    tracing::error!(
                        record_id = %record_id,
                        error = %mark_err,
                        "could not mark record failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Steps 2-5 of the saga. Any error propagates to the caller, which
    /// drives the record to `Failed`.
    async fn run_saga(
        &self,
        record_id: RecordId,
        request: &NewRecord,
        author: &ActorId,
        recipient: &X25519PublicKey,
    ) -> Result<HealthRecordMetadata> {
        // Encrypt: hash the canonical plaintext first, then seal it.
        tracing::debug!(record_id = %record_id, state = ?SagaState::Encrypting, "saga step");
        let data_hash = hash_value(&request.body);
        let plaintext = canonical_bytes(&request.body);
        let package = EncryptedPackage::encrypt(&plaintext, recipient)?;
        let package_bytes = package.to_bytes();

        // Store the package under its content address.
        let content_address = self.store_with_retry(&package_bytes).await?;
        tracing::debug!(
            record_id = %record_id,
            state = ?SagaState::Stored,
            address = %content_address,
            "saga step"
        );

        // Log the create asset; this needs the record id minted at reserve.
        let asset = AuditAsset::new(record_id, author.clone(), AuditAction::Create, data_hash);
        let receipt = self.log_with_retry(asset).await?;
        tracing::debug!(
            record_id = %record_id,
            state = ?SagaState::Logged,
            tx = %receipt.transaction_id,
            "saga step"
        );

        // Finalize: attach the reference triple atomically.
        let refs = FinalizedRefs {
            content_address,
            ledger_tx: receipt.transaction_id,
            data_hash,
        };
        let metadata = self.repository.finalize(&record_id, refs).await?;
        tracing::info!(record_id = %record_id, state = ?SagaState::Finalized, "record finalized");
        Ok(metadata)
    }

    /// Read path: fetch, decrypt, and parse a finalized record.
    ///
    /// Pending and failed rows are reported as not found - a half-written
    /// record is never exposed. The read is access-logged best-effort.
    pub async fn open_record(
        &self,
        record_id: &RecordId,
        caller: &ActorId,
        recipient_secret: &X25519SecretKey,
    ) -> Result<(HealthRecordMetadata, Value)> {
        let metadata = self
            .repository
            .get(record_id)
            .await?
            .filter(HealthRecordMetadata::is_visible)
            .ok_or(PipelineError::NotFound(*record_id))?;

        if metadata.student_id != *caller && !metadata.authorized_users.contains(caller) {
            return Err(PipelineError::NotAuthorized(caller.to_string()));
        }

        let address = metadata
            .content_address
            .ok_or_else(|| PipelineError::Validation("finalized row missing content address".into()))?;

        let stream = match tokio::time::timeout(self.config.io_timeout, self.store.retrieve(&address))
            .await
        {
            Ok(res) => res?,
            Err(_) => return Err(PipelineError::Timeout("content store read")),
        };
        let package_bytes = stream.read_to_end().await?;

        let package = EncryptedPackage::from_bytes(&package_bytes)?;
        let plaintext = package.decrypt(recipient_secret)?;
        let body: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| PipelineError::Validation(format!("decrypted payload is not valid JSON: {e}")))?;

        // Best-effort: a failed audit write never blocks the read.
        self.access_log
            .log_access(*record_id, caller.clone(), AuditAction::Read)
            .await;

        Ok((metadata, body))
    }

    /// Integrity check for a candidate plaintext; see [`IntegrityVerifier`].
    pub async fn verify(&self, record_id: &RecordId, candidate: &Value) -> Result<VerifyOutcome> {
        self.verifier().verify(record_id, candidate).await
    }

    /// Store with timeout and bounded retry; escalates to
    /// `StoreUnavailable` once the budget is exhausted.
    async fn store_with_retry(&self, bytes: &[u8]) -> Result<ContentAddress> {
        let store = &self.store;
        let timeout = self.config.io_timeout;

        let result = retry_transient(
            &self.config.retry,
            || async move {
                match tokio::time::timeout(timeout, store.store(bytes)).await {
                    Ok(res) => res.map_err(PipelineError::from),
                    Err(_) => Err(PipelineError::Timeout("content store write")),
                }
            },
            PipelineError::is_transient,
        )
        .await;

        result.map_err(|err| {
            if err.is_transient() {
                PipelineError::StoreUnavailable(err.to_string())
            } else {
                err
            }
        })
    }

    /// Append with timeout and bounded retry; escalates to
    /// `LedgerUnavailable` once the budget is exhausted.
    async fn log_with_retry(&self, asset: AuditAsset) -> Result<LedgerReceipt> {
        let ledger = &self.ledger;
        let timeout = self.config.io_timeout;
        let asset = &asset;

        let result = retry_transient(
            &self.config.retry,
            || async move {
                match tokio::time::timeout(timeout, ledger.create_asset(asset.clone())).await {
                    Ok(res) => res.map_err(PipelineError::from),
                    Err(_) => Err(PipelineError::Timeout("audit ledger append")),
                }
            },
            PipelineError::is_transient,
        )
        .await;

        result.map_err(|err| {
            if err.is_transient() {
                PipelineError::LedgerUnavailable(err.to_string())
            } else {
                err
            }
        })
    }
}

/// Reject malformed creation requests before touching any backend.
fn validate_request(request: &NewRecord) -> Result<()> {
    if !request.body.is_object() {
        return Err(PipelineError::Validation(
            "record body must be a JSON object".into(),
        ));
    }
    if request.student_id.as_str().is_empty() {
        return Err(PipelineError::Validation("student id must not be empty".into()));
    }
    if let DoctorRef::External { name, hospital } = &request.doctor {
        if name.is_empty() || hospital.is_empty() {
            return Err(PipelineError::Validation(
                "external records need a doctor and hospital name".into(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request_with_body(body: Value) -> NewRecord {
        NewRecord {
            student_id: ActorId::from("student-1"),
            doctor: DoctorRef::Internal(ActorId::from("doctor-1")),
            authorized_users: vec![ActorId::from("doctor-1")],
            body,
        }
    }

    #[test]
    fn test_validate_rejects_non_object_body() {
        let request = request_with_body(json!("just a string"));
        assert!(matches!(
            validate_request(&request),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_student() {
        let mut request = request_with_body(json!({"diagnosis": "flu"}));
        request.student_id = ActorId::from("");
        assert!(matches!(
            validate_request(&request),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_external_doctor() {
        let mut request = request_with_body(json!({"diagnosis": "flu"}));
        request.doctor = DoctorRef::External {
            name: String::new(),
            hospital: "General".into(),
        };
        assert!(matches!(
            validate_request(&request),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let request = request_with_body(json!({"diagnosis": "flu"}));
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn test_saga_terminal_states() {
        assert!(SagaState::Finalized.is_terminal());
        assert!(SagaState::Failed.is_terminal());
        assert!(!SagaState::Reserved.is_terminal());
        assert!(!SagaState::Stored.is_terminal());
    }
}
