//! SQLite implementation of the ContentStore trait.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite behind an
//! internal mutex. Streamed retrieval reads the blob in windows via
//! `substr`, so a large package never has to be materialized whole.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension};

use medvault_core::ContentAddress;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::stream::{BlobStream, ChunkSource, CHUNK_SIZE};
use crate::traits::ContentStore;

/// SQLite-based content store.
///
/// Thread-safe via internal Mutex.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = lock_conn(&self.conn)?;
        f(&conn)
    }
}

/// Lock a shared connection, mapping a poisoned mutex to a store error.
fn lock_conn(conn: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StoreError::Unavailable(format!("connection mutex poisoned: {}", e)))
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn store(&self, bytes: &[u8]) -> Result<ContentAddress> {
        let address = ContentAddress::compute(bytes);

        self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO blobs (address, size, data, stored_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    address.as_bytes().as_slice(),
                    bytes.len() as i64,
                    bytes,
                    now_millis()
                ],
            )?;
            if changed == 0 {
                tracing::debug!(address = %address, "blob already stored, deduplicated");
            }
            Ok(())
        })?;

        Ok(address)
    }

    async fn retrieve(&self, address: &ContentAddress) -> Result<BlobStream> {
        let size = self.with_conn(|conn| {
            conn.query_row(
                "SELECT size FROM blobs WHERE address = ?1",
                params![address.as_bytes().as_slice()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(StoreError::from)
        })?;

        let size = size.ok_or_else(|| StoreError::NotFound(address.to_hex()))? as u64;

        let source = SqliteChunks {
            conn: Arc::clone(&self.conn),
            address: *address,
            offset: 0,
            size,
        };
        Ok(BlobStream::new(Box::new(source), size))
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM blobs WHERE address = ?1",
                    params![address.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    async fn size(&self, address: &ContentAddress) -> Result<u64> {
        self.with_conn(|conn| {
            let size: Option<i64> = conn
                .query_row(
                    "SELECT size FROM blobs WHERE address = ?1",
                    params![address.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            size.map(|s| s as u64)
                .ok_or_else(|| StoreError::NotFound(address.to_hex()))
        })
    }
}

/// Chunk source that reads one window of a stored blob per call.
struct SqliteChunks {
    conn: Arc<Mutex<Connection>>,
    address: ContentAddress,
    offset: u64,
    size: u64,
}

#[async_trait]
impl ChunkSource for SqliteChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.offset >= self.size {
            return Ok(None);
        }

        let want = (self.size - self.offset).min(CHUNK_SIZE as u64);
        let conn = lock_conn(&self.conn)?;

        // substr is 1-indexed and operates on bytes for BLOB arguments.
        let chunk: Option<Vec<u8>> = conn
            .query_row(
                "SELECT substr(data, ?1, ?2) FROM blobs WHERE address = ?3",
                params![
                    (self.offset + 1) as i64,
                    want as i64,
                    self.address.as_bytes().as_slice()
                ],
                |row| row.get(0),
            )
            .optional()?;

        let chunk = chunk.ok_or_else(|| StoreError::NotFound(self.address.to_hex()))?;
        if chunk.len() as u64 != want {
            return Err(StoreError::InvalidData(format!(
                "short read at offset {}: wanted {}, got {}",
                self.offset,
                want,
                chunk.len()
            )));
        }

        self.offset += want;
        Ok(Some(Bytes::from(chunk)))
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let bytes = b"ciphertext package";

        let address = store.store(bytes).await.unwrap();
        let retrieved = store.retrieve(&address).await.unwrap().read_to_end().await.unwrap();
        assert_eq!(retrieved, bytes);
    }

    #[tokio::test]
    async fn test_sqlite_store_idempotent() {
        let store = SqliteStore::open_memory().unwrap();

        let a1 = store.store(b"dup").await.unwrap();
        let a2 = store.store(b"dup").await.unwrap();
        assert_eq!(a1, a2);

        let count: i64 = store
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_sqlite_retrieve_missing() {
        let store = SqliteStore::open_memory().unwrap();
        let missing = ContentAddress::compute(b"absent");
        assert!(matches!(
            store.retrieve(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_sqlite_large_blob_chunked() {
        let store = SqliteStore::open_memory().unwrap();
        let large: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 256) as u8).collect();

        let address = store.store(&large).await.unwrap();
        assert_eq!(store.size(&address).await.unwrap(), large.len() as u64);

        let mut stream = store.retrieve(&address).await.unwrap();
        let mut out = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            chunks += 1;
            out.extend_from_slice(&chunk);
        }
        assert_eq!(chunks, 4);
        assert_eq!(out, large);
    }

    #[tokio::test]
    async fn test_sqlite_persistence_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let address = {
            let store = SqliteStore::open(&path).unwrap();
            store.store(b"durable").await.unwrap()
        };

        let store = SqliteStore::open(&path).unwrap();
        let bytes = store.retrieve(&address).await.unwrap().read_to_end().await.unwrap();
        assert_eq!(bytes, b"durable");
    }
}
