//! # Medvault Ledger
//!
//! Append-only, tamper-evident audit trail for health record events.
//!
//! ## Overview
//!
//! Every record creation and access event becomes an [`AuditAsset`]. Assets
//! are signed by the ledger's Ed25519 keypair over their canonical CBOR
//! encoding and assigned a monotonically increasing transaction id. There is
//! no update or delete operation anywhere in this crate - history can only
//! grow.
//!
//! Access logging is best-effort by contract: [`AccessLogger`] never fails
//! the caller, parking failed writes in a bounded local retry queue instead.
//!
//! ## Key Types
//!
//! - [`AuditLedger`] - The async trait any append-only backend satisfies
//! - [`AuditAsset`] - One creation/access event
//! - [`LedgerEntry`] - A signed, sequenced asset as stored
//! - [`MemoryLedger`] / [`SqliteLedger`] - The provided backends
//! - [`AccessLogger`] - Fire-and-forget access logging with a retry queue

pub mod access;
pub mod asset;
pub mod error;
pub mod memory;
pub mod migration;
pub mod signing;
pub mod sqlite;
pub mod traits;

pub use access::AccessLogger;
pub use asset::{AssetId, AuditAsset, LedgerEntry, LedgerReceipt, TransactionId};
pub use error::{LedgerError, Result};
pub use memory::MemoryLedger;
pub use signing::{LedgerKeypair, LedgerPublicKey, LedgerSignature};
pub use sqlite::SqliteLedger;
pub use traits::AuditLedger;
