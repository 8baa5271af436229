//! # filecast
//!
//! Distribute one file from the member that has it to every other member of
//! a fixed process group, without a shared filesystem.
//!
//! ## Overview
//!
//! A run goes through the same phases on every member:
//!
//! - **Election**: agree on the root, the member holding the authoritative copy
//! - **Preflight**: refuse to overwrite existing destinations unless allowed
//! - **Inventory**: the coordinator logs who has what, on which host
//! - **Transfer**: the root broadcasts the file in fixed-size chunks, in lock-step
//! - **Verification**: digests are gathered and compared at the coordinator
//!
//! ## Key Concepts
//!
//! - **Collective symmetry**: every member issues the same collective calls
//!   in the same order, whatever its role or its local state.
//! - **Group abort**: any failure after configuration validation leaves the
//!   group in an unknown state and terminates every member.
//! - **Exit codes**: 0 on success, 2 when a destination exists and
//!   overwriting was not allowed, 1 otherwise.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filecast::{CastConfig, Session};
//! use filecast::comm::MemoryGroup;
//! use filecast::core::{ElectionStrategy, Rank};
//! use filecast::store::DiskStore;
//!
//! async fn example() {
//!     let config = CastConfig::new("/scratch/{rank}/model.bin", ElectionStrategy::ByRank(Rank(0)));
//!
//!     let handles: Vec<_> = MemoryGroup::new(4)
//!         .into_iter()
//!         .map(|comm| {
//!             let session = Session::new(comm, DiskStore::new(), config.clone());
//!             tokio::spawn(async move { session.execute().await })
//!         })
//!         .collect();
//!
//!     for handle in handles {
//!         let outcome = handle.await.unwrap();
//!         println!("exit code {}", outcome.exit_code());
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `filecast::core` - Chunk sizes, chunk plans, digests, election strategies
//! - `filecast::store` - Local file access
//! - `filecast::comm` - The communicator trait and the in-process group

pub mod config;
pub mod error;
pub mod inventory;
pub mod session;
pub mod verify;

mod elect;
mod preflight;
mod transfer;

// Re-export component crates
pub use filecast_comm as comm;
pub use filecast_core as core;
pub use filecast_store as store;

// Re-export main types for convenience
pub use config::{CastConfig, CliArgs, OverwritePolicy, DEFAULT_CHUNK_SIZE, RANK_PLACEHOLDER};
pub use error::{
    CastError, ErrorKind, Fatal, FatalGroupError, Result, EXIT_DESTINATION_EXISTS, EXIT_FAILURE,
    EXIT_SUCCESS,
};
pub use inventory::{local_hostname, FileInfo, Inventory};
pub use session::{CastReport, RunOutcome, Session};
pub use verify::DigestTable;
