//! # Medvault Testkit
//!
//! Testing utilities for the medvault workspace: memory-backed pipeline
//! fixtures and proptest generators.
//!
//! ## Fixtures
//!
//! [`TestFixture`] wires a [`RecordPipeline`] over memory backends with a
//! generated ledger keypair, so integration-style tests need one line of
//! setup:
//!
//! ```rust
//! use medvault_testkit::TestFixture;
//!
//! # async fn example() {
//! let fixture = TestFixture::new();
//! let doctor = fixture.issue_keys();
//! let request = fixture.record_for("student-1", "doctor-1");
//! let metadata = fixture
//!     .pipeline
//!     .create_encrypted_record(request, &"student-1".into(), &doctor.public)
//!     .await
//!     .unwrap();
//! # }
//! ```
//!
//! ## Generators
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use medvault_testkit::generators::*;
//! use proptest::prelude::*;
//!
//! proptest! {
//!     #[test]
//!     fn roundtrips(payload in arb_payload()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! [`RecordPipeline`]: medvault::RecordPipeline

pub mod fixtures;
pub mod generators;

pub use fixtures::TestFixture;
