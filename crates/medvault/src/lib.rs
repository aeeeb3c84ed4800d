//! # Medvault
//!
//! The unified API for the medvault system - encrypted student health
//! records with a content-addressed ciphertext store and a tamper-evident
//! audit trail.
//!
//! ## Overview
//!
//! [`RecordPipeline`] is the single entry point the surrounding application
//! uses. Creating a record runs a saga across three independent stores:
//!
//! 1. **Reserve** a pending metadata row and take the per-record lock
//! 2. **Encrypt** the payload for the recipient (hybrid X25519 + AEAD)
//! 3. **Store** the ciphertext package under its content address
//! 4. **Log** a signed `create` asset in the append-only audit ledger
//! 5. **Finalize** the metadata row with the `(address, tx, hash)` triple
//!
//! Any step failure drives the record to `Failed` and releases the lock;
//! a half-written record is never observable. [`IntegrityVerifier`] closes
//! the loop on read paths by comparing a candidate plaintext against the
//! hash the ledger recorded at creation time.
//!
//! ## Key Concepts
//!
//! - **Record**: Encrypted once, addressed by ciphertext digest.
//! - **Saga**: Whole-operation retry with a stable record id; no partial
//!   exposure on failure.
//! - **Audit asset**: Immutable. Never edited. Access history only grows.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use medvault::{ActorId, DoctorRef, NewRecord, PipelineConfig, RecordPipeline};
//! use medvault::crypto::KeyManager;
//! use medvault::ledger::{LedgerKeypair, MemoryLedger};
//! use medvault::repository::MemoryRepository;
//! use medvault::store::MemoryStore;
//!
//! async fn example() {
//!     let keys = KeyManager::default();
//!     let doctor = keys.generate_keypair().unwrap();
//!
//!     let pipeline = RecordPipeline::new(
//!         Arc::new(MemoryRepository::new()),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(MemoryLedger::new(LedgerKeypair::generate())),
//!         PipelineConfig::default(),
//!     );
//!
//!     let request = NewRecord {
//!         student_id: ActorId::from("student-7"),
//!         doctor: DoctorRef::Internal(ActorId::from("doctor-2")),
//!         authorized_users: vec![ActorId::from("doctor-2")],
//!         body: serde_json::json!({"diagnosis": "flu"}),
//!     };
//!
//!     let metadata = pipeline
//!         .create_encrypted_record(request, &ActorId::from("student-7"), &doctor.public)
//!         .await
//!         .unwrap();
//!     println!("stored at {}", metadata.content_address.unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `medvault::core` - Core primitives (RecordId, DataHash, etc.)
//! - `medvault::crypto` - Key management and hybrid encryption
//! - `medvault::store` - Content-addressed blob storage
//! - `medvault::ledger` - Append-only audit ledger

pub mod error;
pub mod locks;
pub mod pipeline;
pub mod repository;
pub mod retry;
pub mod verify;

// Re-export component crates
pub use medvault_core as core;
pub use medvault_crypto as crypto;
pub use medvault_ledger as ledger;
pub use medvault_store as store;

// Re-export main types for convenience
pub use error::{PipelineError, Result};
pub use locks::{LockTable, RecordGuard};
pub use pipeline::{NewRecord, PipelineConfig, RecordPipeline, SagaState};
pub use repository::{
    DoctorRef, FinalizedRefs, HealthRecordMetadata, MemoryRepository, MetadataRepository,
    RecordStatus, RepositoryError,
};
pub use retry::RetryPolicy;
pub use verify::{IntegrityVerifier, VerifyOutcome};

// Re-export commonly used core types
pub use medvault_core::{ActorId, AuditAction, ContentAddress, DataHash, RecordId};
