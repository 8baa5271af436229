//! # filecast comm
//!
//! The group communication substrate filecast runs on.
//!
//! ## Overview
//!
//! A run is a fixed group of members, each with a rank in `[0, size)`.
//! Members coordinate exclusively through collective calls, which every
//! member must issue in the same order with the same shapes. A member that
//! hits an unrecoverable error aborts the whole group.
//!
//! ## Key Types
//!
//! - [`Communicator`] - Broadcast, all-gather, gather, barrier and abort
//! - [`CommunicatorExt`] - Typed helpers that CBOR-encode values
//! - [`MemoryGroup`] - An in-process group over tokio channels
//!
//! ## Usage
//!
//! ```rust,no_run
//! use filecast_comm::{Communicator, CommunicatorExt, MemoryGroup};
//! use filecast_core::Rank;
//!
//! async fn example() {
//!     let group = MemoryGroup::new(2);
//!     let handles: Vec<_> = group
//!         .into_iter()
//!         .map(|comm| {
//!             tokio::spawn(async move {
//!                 let size = if comm.rank() == Rank(0) { 42 } else { 0 };
//!                 comm.broadcast_u64(size, Rank(0)).await.unwrap()
//!             })
//!         })
//!         .collect();
//!     for handle in handles {
//!         assert_eq!(handle.await.unwrap(), 42);
//!     }
//! }
//! ```

pub mod codec;
pub mod communicator;
pub mod error;
pub mod memory;

pub use communicator::{Collective, Communicator, CommunicatorExt};
pub use error::{CommError, Result};
pub use memory::{AbortSignal, MemoryCommunicator, MemoryGroup, DEFAULT_CHANNEL_CAPACITY};
