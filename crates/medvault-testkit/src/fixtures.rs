//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a full pipeline over memory
//! backends.

use std::sync::Arc;

use serde_json::json;

use medvault::repository::MemoryRepository;
use medvault::{DoctorRef, NewRecord, PipelineConfig, RecordPipeline};
use medvault_core::ActorId;
use medvault_crypto::{KeyManager, KeyPair};
use medvault_ledger::{LedgerKeypair, MemoryLedger};
use medvault_store::MemoryStore;

/// A memory-backed pipeline with all collaborators exposed.
pub struct TestFixture {
    pub key_manager: KeyManager,
    pub repository: Arc<MemoryRepository>,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub pipeline: RecordPipeline<MemoryRepository, MemoryStore, MemoryLedger>,
}

impl TestFixture {
    /// Create a fixture with default pipeline configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a fixture with explicit pipeline configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        let repository = Arc::new(MemoryRepository::new());
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new(LedgerKeypair::generate()));
        let pipeline = RecordPipeline::new(
            Arc::clone(&repository),
            Arc::clone(&store),
            Arc::clone(&ledger),
            config,
        );
        Self {
            key_manager: KeyManager::default(),
            repository,
            store,
            ledger,
            pipeline,
        }
    }

    /// Issue a fresh recipient key pair.
    pub fn issue_keys(&self) -> KeyPair {
        self.key_manager
            .generate_keypair()
            .expect("test entropy should not fail")
    }

    /// A minimal well-formed creation request.
    pub fn record_for(&self, student: &str, doctor: &str) -> NewRecord {
        self.record_with_body(student, doctor, json!({"diagnosis": "flu"}))
    }

    /// A creation request with an explicit body.
    pub fn record_with_body(
        &self,
        student: &str,
        doctor: &str,
        body: serde_json::Value,
    ) -> NewRecord {
        NewRecord {
            student_id: ActorId::from(student),
            doctor: DoctorRef::Internal(ActorId::from(doctor)),
            authorized_users: vec![ActorId::from(doctor)],
            body,
        }
    }

    /// A manual-upload request referencing an external practitioner.
    pub fn external_record(&self, student: &str, doctor_name: &str, hospital: &str) -> NewRecord {
        NewRecord {
            student_id: ActorId::from(student),
            doctor: DoctorRef::External {
                name: doctor_name.to_string(),
                hospital: hospital.to_string(),
            },
            authorized_users: vec![],
            body: json!({"diagnosis": "sprained ankle", "treatment": "rest"}),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvault::{RecordStatus, VerifyOutcome};
    use serde_json::json;

    #[tokio::test]
    async fn test_fixture_full_cycle() {
        let fixture = TestFixture::new();
        let doctor = fixture.issue_keys();
        let author = ActorId::from("student-1");

        let metadata = fixture
            .pipeline
            .create_encrypted_record(fixture.record_for("student-1", "doctor-1"), &author, &doctor.public)
            .await
            .unwrap();
        assert_eq!(metadata.status, RecordStatus::Finalized);

        let (_meta, body) = fixture
            .pipeline
            .open_record(&metadata.record_id, &author, &doctor.secret)
            .await
            .unwrap();
        assert_eq!(body, json!({"diagnosis": "flu"}));

        assert_eq!(
            fixture
                .pipeline
                .verify(&metadata.record_id, &json!({"diagnosis": "flu"}))
                .await
                .unwrap(),
            VerifyOutcome::Match
        );
    }

    #[tokio::test]
    async fn test_external_record_accepted() {
        let fixture = TestFixture::new();
        let doctor = fixture.issue_keys();
        let author = ActorId::from("student-2");

        let metadata = fixture
            .pipeline
            .create_encrypted_record(
                fixture.external_record("student-2", "Dr. Osei", "City General"),
                &author,
                &doctor.public,
            )
            .await
            .unwrap();
        assert_eq!(metadata.status, RecordStatus::Finalized);
        assert!(matches!(
            metadata.doctor,
            DoctorRef::External { .. }
        ));
    }
}
