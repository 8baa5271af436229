//! # filecast store
//!
//! Local file access for filecast. Provides a trait-based interface over a
//! member's own view of the filesystem, with disk and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The session never touches the filesystem directly; it goes through the
//! [`FileStore`] trait. The primary implementation is [`DiskStore`], with
//! [`MemoryStore`] for tests.
//!
//! ## Key Types
//!
//! - [`FileStore`] - The async trait for size, digest, read and write
//! - [`ChunkReader`] / [`ChunkWriter`] - Sequential chunk I/O
//! - [`DiskStore`] - The local filesystem
//! - [`MemoryStore`] - In-memory files with write fault injection
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use filecast_store::{DiskStore, FileStore};
//!
//! async fn example() {
//!     let store = DiskStore::new();
//!     let size = store.size(Path::new("model.bin")).await.unwrap();
//!     println!("local size: {:?}", size);
//! }
//! ```

pub mod disk;
pub mod error;
pub mod memory;
pub mod traits;

pub use disk::DiskStore;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use traits::{ChunkReader, ChunkWriter, FileStore};
