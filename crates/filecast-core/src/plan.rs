//! Chunk planning.
//!
//! A file of `file_size` bytes is cut into `ceil(file_size / chunk_size)`
//! chunks. Every chunk is `chunk_size` bytes long except the last, which
//! holds the remainder and is never empty. An empty file has no chunks.
//!
//! Every member derives the same plan from the same two numbers, which is
//! what keeps the per-chunk broadcast lengths identical across the group.

use std::num::NonZeroU64;

use crate::error::ConfigError;

/// The chunk layout of a single transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: NonZeroU64,
    chunk_count: u64,
}

/// One chunk of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk, starting at 0.
    pub index: u64,
    /// Byte offset of the chunk within the file.
    pub offset: u64,
    /// Length of the chunk in bytes.
    pub len: u64,
}

impl ChunkPlan {
    /// Plan a transfer of `file_size` bytes in chunks of `chunk_size`.
    pub fn new(file_size: u64, chunk_size: NonZeroU64) -> Self {
        let chunk_count = if file_size == 0 {
            0
        } else {
            (file_size - 1) / chunk_size.get() + 1
        };

        Self {
            file_size,
            chunk_size,
            chunk_count,
        }
    }

    /// Plan a transfer, rejecting a zero chunk size.
    pub fn try_new(file_size: u64, chunk_size: u64) -> Result<Self, ConfigError> {
        let chunk_size = NonZeroU64::new(chunk_size).ok_or(ConfigError::ZeroChunkSize)?;
        Ok(Self::new(file_size, chunk_size))
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size.get()
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }

    /// Length of the chunk at `index`, or `None` past the end.
    pub fn chunk_len(&self, index: u64) -> Option<u64> {
        if index >= self.chunk_count {
            None
        } else if index + 1 < self.chunk_count {
            Some(self.chunk_size.get())
        } else {
            Some(self.last_chunk_len())
        }
    }

    /// Length of the final chunk, in `(0, chunk_size]`; 0 for an empty file.
    pub fn last_chunk_len(&self) -> u64 {
        if self.chunk_count == 0 {
            0
        } else {
            self.file_size - self.chunk_size.get() * (self.chunk_count - 1)
        }
    }

    /// Largest buffer any chunk of this plan needs.
    pub fn max_chunk_len(&self) -> u64 {
        self.chunk_size.get().min(self.file_size)
    }

    /// Iterate over the chunks in transfer order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count).map(move |index| Chunk {
            index,
            offset: index * self.chunk_size.get(),
            len: self.chunk_len(index).unwrap_or_default(),
        })
    }
}
