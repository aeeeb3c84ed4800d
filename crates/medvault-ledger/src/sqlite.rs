//! SQLite implementation of the AuditLedger trait.
//!
//! The primary persistent backend. The schema is append-only; this module
//! contains no UPDATE or DELETE statements.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use medvault_core::RecordId;

use crate::asset::{AssetId, AuditAsset, LedgerEntry, LedgerReceipt, TransactionId};
use crate::error::{LedgerError, Result};
use crate::migration;
use crate::signing::{LedgerKeypair, LedgerPublicKey, LedgerSignature};
use crate::traits::AuditLedger;

/// SQLite-based audit ledger.
///
/// Thread-safe via internal Mutex.
pub struct SqliteLedger {
    keypair: LedgerKeypair,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite ledger at the given path.
    pub fn open(path: impl AsRef<Path>, keypair: LedgerKeypair) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            keypair,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite ledger.
    ///
    /// Useful for testing.
    pub fn open_memory(keypair: LedgerKeypair) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            keypair,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| LedgerError::Unavailable(format!("connection mutex poisoned: {}", e)))?;
        f(&conn)
    }
}

#[async_trait]
impl AuditLedger for SqliteLedger {
    async fn create_asset(&self, asset: AuditAsset) -> Result<LedgerReceipt> {
        let canonical = asset.canonical_bytes();
        let signature = self.keypair.sign(&canonical);
        let asset_id = AssetId::compute(&canonical, &signature);
        let author = self.keypair.public_key();
        let record_hex = asset.record_id.to_hex();

        let tx_id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO assets (asset_id, record_id, asset_cbor, author, signature, appended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    asset_id.as_bytes().as_slice(),
                    record_hex,
                    canonical,
                    author.as_bytes().as_slice(),
                    signature.as_bytes().as_slice(),
                    now_millis()
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(LedgerReceipt {
            transaction_id: TransactionId(tx_id as u64),
            asset_id,
        })
    }

    async fn find_by_record_id(&self, record_id: &RecordId) -> Result<Vec<LedgerEntry>> {
        let record_hex = record_id.to_hex();

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tx_id, asset_id, asset_cbor, author, signature
                 FROM assets WHERE record_id = ?1 ORDER BY tx_id",
            )?;

            let rows = stmt.query_map(params![record_hex], |row| {
                let tx_id: i64 = row.get(0)?;
                let asset_id: Vec<u8> = row.get(1)?;
                let asset_cbor: Vec<u8> = row.get(2)?;
                let author: Vec<u8> = row.get(3)?;
                let signature: Vec<u8> = row.get(4)?;
                Ok((tx_id, asset_id, asset_cbor, author, signature))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (tx_id, asset_id, asset_cbor, author, signature) = row?;
                entries.push(LedgerEntry {
                    transaction_id: TransactionId(tx_id as u64),
                    asset_id: AssetId::from_bytes(fixed_bytes::<32>(&asset_id, "asset_id")?),
                    asset: AuditAsset::from_canonical_bytes(&asset_cbor)?,
                    author: LedgerPublicKey::from_bytes(fixed_bytes::<32>(&author, "author")?),
                    signature: LedgerSignature::from_bytes(fixed_bytes::<64>(
                        &signature,
                        "signature",
                    )?),
                });
            }
            Ok(entries)
        })
    }
}

/// Convert a stored blob into a fixed-size array.
fn fixed_bytes<const N: usize>(bytes: &[u8], column: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        LedgerError::Serialization(format!(
            "column {column}: expected {N} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
