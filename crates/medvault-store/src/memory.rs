//! In-memory implementation of the ContentStore trait.
//!
//! Primarily for testing. Same semantics as SQLite but keeps everything in
//! memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use medvault_core::ContentAddress;

use crate::error::{Result, StoreError};
use crate::stream::{BlobStream, MemoryChunks};
use crate::traits::ContentStore;

/// In-memory content store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    blobs: RwLock<HashMap<ContentAddress, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of distinct blobs held.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().unwrap().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn store(&self, bytes: &[u8]) -> Result<ContentAddress> {
        let address = ContentAddress::compute(bytes);

        let mut blobs = self.blobs.write().unwrap();
        if !blobs.contains_key(&address) {
            blobs.insert(address, Bytes::copy_from_slice(bytes));
        } else {
            tracing::debug!(address = %address, "blob already stored, deduplicated");
        }

        Ok(address)
    }

    async fn retrieve(&self, address: &ContentAddress) -> Result<BlobStream> {
        let blobs = self.blobs.read().unwrap();
        let data = blobs
            .get(address)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(address.to_hex()))?;
        let len = data.len() as u64;
        Ok(BlobStream::new(Box::new(MemoryChunks::new(data)), len))
    }

    async fn contains(&self, address: &ContentAddress) -> Result<bool> {
        Ok(self.blobs.read().unwrap().contains_key(address))
    }

    async fn size(&self, address: &ContentAddress) -> Result<u64> {
        let blobs = self.blobs.read().unwrap();
        blobs
            .get(address)
            .map(|b| b.len() as u64)
            .ok_or_else(|| StoreError::NotFound(address.to_hex()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_retrieve_roundtrip() {
        let store = MemoryStore::new();
        let bytes = b"encrypted package bytes";

        let address = store.store(bytes).await.unwrap();
        let retrieved = store.retrieve(&address).await.unwrap().read_to_end().await.unwrap();
        assert_eq!(retrieved, bytes);
    }

    #[tokio::test]
    async fn test_store_idempotent_dedup() {
        let store = MemoryStore::new();
        let bytes = b"same bytes";

        let a1 = store.store(bytes).await.unwrap();
        let a2 = store.store(bytes).await.unwrap();

        assert_eq!(a1, a2);
        assert_eq!(store.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_different_bytes_different_address() {
        let store = MemoryStore::new();
        let a1 = store.store(b"one").await.unwrap();
        let a2 = store.store(b"two").await.unwrap();
        assert_ne!(a1, a2);
        assert_eq!(store.blob_count(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_missing_not_found() {
        let store = MemoryStore::new();
        let missing = ContentAddress::compute(b"never stored");
        assert!(matches!(
            store.retrieve(&missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_contains_and_size() {
        let store = MemoryStore::new();
        let address = store.store(b"12345").await.unwrap();

        assert!(store.contains(&address).await.unwrap());
        assert_eq!(store.size(&address).await.unwrap(), 5);

        let missing = ContentAddress::compute(b"absent");
        assert!(!store.contains(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn test_large_blob_streams_in_chunks() {
        let store = MemoryStore::new();
        let large: Vec<u8> = (0..300_000).map(|i| (i % 256) as u8).collect();

        let address = store.store(&large).await.unwrap();
        let mut stream = store.retrieve(&address).await.unwrap();
        assert_eq!(stream.len(), large.len() as u64);

        let mut chunks = 0;
        let mut total = 0;
        while let Some(chunk) = stream.next_chunk().await.unwrap() {
            chunks += 1;
            total += chunk.len();
        }
        assert!(chunks > 1, "large blob should arrive in multiple chunks");
        assert_eq!(total, large.len());
    }
}
