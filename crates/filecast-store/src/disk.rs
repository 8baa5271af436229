//! Disk implementation of the FileStore trait.
//!
//! This is the primary store. Reads and writes go through `tokio::fs`;
//! digesting a whole file runs on the blocking pool via `spawn_blocking`
//! so large files do not stall the runtime.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use filecast_core::{Digester, FileDigest};

use crate::error::{Result, StoreError};
use crate::traits::{ChunkReader, ChunkWriter, FileStore};

/// Store backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStore;

impl DiskStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStore for DiskStore {
    async fn size(&self, path: &Path) -> Result<Option<u64>> {
        let len = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        // Metadata is visible even without read permission.
        match File::open(path).await {
            Ok(_) => Ok(Some(len)),
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn digest(&self, path: &Path) -> Result<Option<FileDigest>> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || digest_blocking(&path))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
    }

    async fn open_reader(&self, path: &Path) -> Result<Box<dyn ChunkReader>> {
        let file = File::open(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(path.to_path_buf()),
            _ => StoreError::io(path, e),
        })?;
        Ok(Box::new(DiskReader {
            path: path.to_path_buf(),
            file,
        }))
    }

    async fn create_writer(&self, path: &Path) -> Result<Box<dyn ChunkWriter>> {
        let file = File::create(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Box::new(DiskWriter {
            path: path.to_path_buf(),
            file,
        }))
    }
}

fn digest_blocking(path: &Path) -> Result<Option<FileDigest>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if is_absent(&e) => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut digester = Digester::new();
    digester
        .update_reader(file)
        .map_err(|e| StoreError::io(path, e))?;
    Ok(Some(digester.finalize()))
}

/// Open errors that mean "this member has no usable copy".
fn is_absent(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied)
}

struct DiskReader {
    path: PathBuf,
    file: File,
}

#[async_trait]
impl ChunkReader for DiskReader {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.file.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(StoreError::Truncated {
                path: self.path.clone(),
                wanted: buf.len(),
            }),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

struct DiskWriter {
    path: PathBuf,
    file: File,
}

#[async_trait]
impl ChunkWriter for DiskWriter {
    async fn write_chunk(&mut self, buf: &[u8]) -> Result<()> {
        self.file
            .write_all(buf)
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }

    async fn finish(&mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| StoreError::io(&self.path, e))
    }
}
