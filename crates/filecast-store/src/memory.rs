//! In-memory implementation of the FileStore trait.
//!
//! This is primarily for testing. It has the same semantics as the disk
//! store but keeps every file in memory, and it can inject faults: files
//! that cannot be read, failing writes, and silent corruption of the bytes
//! that land.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use filecast_core::FileDigest;

use crate::error::{Result, StoreError};
use crate::traits::{ChunkReader, ChunkWriter, FileStore};

/// In-memory store implementation.
///
/// Clones share the same files, so a test can keep a handle to inspect or
/// tamper with what a member wrote. Thread-safe via RwLock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// File contents by path.
    files: HashMap<PathBuf, BytesMut>,

    /// Files that exist but cannot be read.
    unreadable: HashSet<PathBuf>,

    /// Writes fail once this many chunks have been written.
    fail_after_chunks: Option<usize>,

    /// Flip a bit in every written chunk.
    corrupt_writes: bool,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one file.
    pub fn with_file(path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) -> Self {
        let store = Self::new();
        store.insert(path, contents);
        store
    }

    /// Put a file into the store, replacing any previous contents.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl AsRef<[u8]>) {
        let mut inner = self.inner.write().unwrap();
        inner
            .files
            .insert(path.into(), BytesMut::from(contents.as_ref()));
    }

    /// Remove a file from the store.
    pub fn remove(&self, path: &Path) -> Option<Bytes> {
        let mut inner = self.inner.write().unwrap();
        inner.files.remove(path).map(BytesMut::freeze)
    }

    /// Current contents of a file.
    pub fn contents(&self, path: &Path) -> Option<Bytes> {
        let inner = self.inner.read().unwrap();
        inner
            .files
            .get(path)
            .map(|b| Bytes::copy_from_slice(b))
    }

    /// Keep the file in place but refuse to read it, like a file without
    /// read permission.
    pub fn make_unreadable(&self, path: impl Into<PathBuf>) {
        self.inner.write().unwrap().unreadable.insert(path.into());
    }

    /// Make every write fail once `chunks` chunks have been written.
    pub fn fail_writes_after(&self, chunks: usize) {
        self.inner.write().unwrap().fail_after_chunks = Some(chunks);
    }

    /// Silently flip the lowest bit of the first byte of every written chunk.
    pub fn corrupt_writes(&self) {
        self.inner.write().unwrap().corrupt_writes = true;
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn size(&self, path: &Path) -> Result<Option<u64>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.readable(path).map(|b| b.len() as u64))
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.inner.read().unwrap().files.contains_key(path))
    }

    async fn digest(&self, path: &Path) -> Result<Option<FileDigest>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.readable(path).map(|b| FileDigest::hash(b)))
    }

    async fn open_reader(&self, path: &Path) -> Result<Box<dyn ChunkReader>> {
        if self.inner.read().unwrap().unreadable.contains(path) {
            return Err(StoreError::Injected {
                path: path.to_path_buf(),
                reason: "file is unreadable".to_string(),
            });
        }
        let contents = self
            .contents(path)
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
        Ok(Box::new(MemoryReader {
            path: path.to_path_buf(),
            remaining: contents,
        }))
    }

    async fn create_writer(&self, path: &Path) -> Result<Box<dyn ChunkWriter>> {
        self.inner.write().unwrap().unreadable.remove(path);
        self.insert(path, b"");
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            store: self.clone(),
            chunks_written: 0,
        }))
    }
}

impl MemoryStoreInner {
    fn readable(&self, path: &Path) -> Option<&BytesMut> {
        if self.unreadable.contains(path) {
            return None;
        }
        self.files.get(path)
    }
}

struct MemoryReader {
    path: PathBuf,
    remaining: Bytes,
}

#[async_trait]
impl ChunkReader for MemoryReader {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.remaining.len() < buf.len() {
            return Err(StoreError::Truncated {
                path: self.path.clone(),
                wanted: buf.len(),
            });
        }
        let chunk = self.remaining.split_to(buf.len());
        buf.copy_from_slice(&chunk);
        Ok(())
    }
}

struct MemoryWriter {
    path: PathBuf,
    store: MemoryStore,
    chunks_written: usize,
}

#[async_trait]
impl ChunkWriter for MemoryWriter {
    async fn write_chunk(&mut self, buf: &[u8]) -> Result<()> {
        let mut inner = self.store.inner.write().unwrap();

        if inner
            .fail_after_chunks
            .is_some_and(|limit| self.chunks_written >= limit)
        {
            return Err(StoreError::Injected {
                path: self.path.clone(),
                reason: format!("write of chunk {} refused", self.chunks_written),
            });
        }

        let corrupt = inner.corrupt_writes;
        let file = inner
            .files
            .get_mut(&self.path)
            .ok_or_else(|| StoreError::NotFound(self.path.clone()))?;

        let start = file.len();
        file.extend_from_slice(buf);
        if corrupt && !buf.is_empty() {
            file[start] ^= 0x01;
            tracing::debug!(path = %self.path.display(), "corrupted written chunk");
        }

        self.chunks_written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
