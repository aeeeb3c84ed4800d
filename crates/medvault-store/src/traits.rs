//! ContentStore trait: the abstract interface for ciphertext persistence.
//!
//! This trait keeps the record pipeline storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests); anything that can
//! store bytes under their digest satisfies it.

use async_trait::async_trait;
use medvault_core::ContentAddress;

use crate::error::Result;
use crate::stream::BlobStream;

/// The ContentStore trait: async interface for content-addressed blobs.
///
/// # Design Notes
///
/// - **Idempotent stores**: storing identical bytes twice returns the same
///   address without duplicating storage.
/// - **Streamed retrieval**: blobs come back as a finite [`BlobStream`] so
///   large payloads are never required whole in memory.
/// - **No mutation**: there is no overwrite or delete; content is identified
///   by its own digest, so a different blob is simply a different address.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Persist bytes under their content address.
    ///
    /// Returns the address; identical bytes always yield the identical
    /// address (dedup invariant).
    async fn store(&self, bytes: &[u8]) -> Result<ContentAddress>;

    /// Retrieve a blob as a lazy byte stream.
    ///
    /// The stream is finite and not restartable; re-issue `retrieve` to
    /// read again. Fails with [`StoreError::NotFound`] for unknown
    /// addresses.
    ///
    /// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
    async fn retrieve(&self, address: &ContentAddress) -> Result<BlobStream>;

    /// Check whether a blob exists.
    async fn contains(&self, address: &ContentAddress) -> Result<bool>;

    /// Size in bytes of a stored blob.
    async fn size(&self, address: &ContentAddress) -> Result<u64>;
}
