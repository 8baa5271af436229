//! # filecast core
//!
//! Pure primitives for distributing one file across a process group.
//!
//! This crate contains no I/O and no communication. It is pure computation
//! over sizes, chunk layouts, digests and gathered election reports.
//!
//! ## Key Types
//!
//! - [`Rank`] - A member's position within its group
//! - [`ChunkPlan`] - How a file of a given size is cut into chunks
//! - [`FileDigest`] - Blake3 content digest compared across ranks
//! - [`ElectionStrategy`] - How the group agrees on the root
//!
//! ## Chunk sizes
//!
//! Sizes are parsed from expressions like `4m`, `1GiB` or `512`; see
//! [`parse_byte_size`].

pub mod digest;
pub mod election;
pub mod error;
pub mod plan;
pub mod size;
pub mod types;

pub use digest::{Digester, FileDigest};
pub use election::{ElectionReport, ElectionStrategy, LocalFacts, StrategySelectors};
pub use error::{ConfigError, ElectionError};
pub use plan::{Chunk, ChunkPlan};
pub use size::{parse_byte_size, ByteSize, GIB, KIB, MIB};
pub use types::Rank;
