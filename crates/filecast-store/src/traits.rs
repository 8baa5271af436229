//! FileStore trait: the abstract interface for a member's local file view.
//!
//! Every member performs purely local I/O on its own view of the
//! filesystem. Implementations include the disk (primary) and in-memory
//! (for tests and fault injection).

use std::path::Path;

use async_trait::async_trait;
use filecast_core::FileDigest;

use crate::error::Result;

/// Sequential reader over a source file.
#[async_trait]
pub trait ChunkReader: Send {
    /// Fill `buf` completely with the next bytes of the file.
    ///
    /// Fails with [`StoreError::Truncated`](crate::StoreError::Truncated)
    /// if the file ends first.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<()>;
}

/// Sequential writer to a destination file.
#[async_trait]
pub trait ChunkWriter: Send {
    /// Append `buf` to the file.
    async fn write_chunk(&mut self, buf: &[u8]) -> Result<()>;

    /// Flush everything written so far to stable storage.
    async fn finish(&mut self) -> Result<()>;
}

/// A member's local file view.
///
/// # Design Notes
///
/// - **Absent is not empty**: `size` returns `None` for a missing file and
///   `Some(0)` for an empty one.
/// - **Unreadable is absent**: a file this member cannot read has no size
///   and no digest, but still `exists`, so it is never silently replaced.
/// - **Exclusive ownership**: a store is only ever used by the member that
///   owns it, so no locking across members is needed.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Size of the file in bytes, or `None` if it does not exist or cannot
    /// be read.
    async fn size(&self, path: &Path) -> Result<Option<u64>>;

    /// Check whether the file exists.
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.size(path).await?.is_some())
    }

    /// Digest of the file's current contents, or `None` if it does not exist.
    async fn digest(&self, path: &Path) -> Result<Option<FileDigest>>;

    /// Open an existing file for sequential reading.
    async fn open_reader(&self, path: &Path) -> Result<Box<dyn ChunkReader>>;

    /// Create (or truncate) a file for sequential writing.
    async fn create_writer(&self, path: &Path) -> Result<Box<dyn ChunkWriter>>;
}
