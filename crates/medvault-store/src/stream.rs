//! Lazy, chunked retrieval of stored blobs.
//!
//! A [`BlobStream`] yields a finite sequence of byte chunks. It is not
//! restartable mid-stream; callers re-issue `retrieve` to read again.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Chunk size for streamed reads.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Backend-specific chunk producer.
#[async_trait]
pub trait ChunkSource: Send {
    /// Produce the next chunk, or `None` once the blob is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// A finite, lazy byte stream over one stored blob.
pub struct BlobStream {
    source: Box<dyn ChunkSource>,
    len: u64,
}

impl BlobStream {
    /// Wrap a chunk source with a known total length.
    pub fn new(source: Box<dyn ChunkSource>, len: u64) -> Self {
        Self { source, len }
    }

    /// Total blob length in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Pull the next chunk, or `None` at end of blob.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.source.next_chunk().await
    }

    /// Drain the stream into a single buffer.
    ///
    /// Convenience for callers that know the blob is small (e.g. an
    /// encrypted package that must be decoded whole anyway).
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.len as usize);
        while let Some(chunk) = self.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

/// Chunk source over an in-memory buffer.
pub(crate) struct MemoryChunks {
    data: Bytes,
    offset: usize,
}

impl MemoryChunks {
    pub(crate) fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }
}

#[async_trait]
impl ChunkSource for MemoryChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.offset >= self.data.len() {
            return Ok(None);
        }
        let end = (self.offset + CHUNK_SIZE).min(self.data.len());
        let chunk = self.data.slice(self.offset..end);
        self.offset = end;
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_chunks_exact_multiple() {
        let data = Bytes::from(vec![0xabu8; CHUNK_SIZE * 2]);
        let mut stream = BlobStream::new(Box::new(MemoryChunks::new(data)), (CHUNK_SIZE * 2) as u64);

        let first = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(first.len(), CHUNK_SIZE);
        let second = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(second.len(), CHUNK_SIZE);
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_to_end_reassembles() {
        let original: Vec<u8> = (0..200_000).map(|i| (i % 251) as u8).collect();
        let stream = BlobStream::new(
            Box::new(MemoryChunks::new(Bytes::from(original.clone()))),
            original.len() as u64,
        );
        assert_eq!(stream.read_to_end().await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_empty_blob() {
        let mut stream = BlobStream::new(Box::new(MemoryChunks::new(Bytes::new())), 0);
        assert!(stream.is_empty());
        assert!(stream.next_chunk().await.unwrap().is_none());
    }
}
