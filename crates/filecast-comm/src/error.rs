//! Error types for the communication module.

use thiserror::Error;

use filecast_core::Rank;

use crate::communicator::Collective;

/// Errors that can occur during collective operations.
#[derive(Debug, Error)]
pub enum CommError {
    /// Some member terminated the whole group.
    #[error("group aborted by rank {by} with exit code {code}")]
    Aborted { by: Rank, code: i32 },

    /// Two members issued different collective calls at the same point.
    #[error("collective mismatch at call #{seq}: this rank issued {local:?}, rank {peer} issued {remote:?}")]
    Desynchronized {
        seq: u64,
        peer: Rank,
        local: Collective,
        remote: Collective,
    },

    /// A broadcast buffer did not have the agreed length.
    #[error("broadcast length mismatch: local buffer is {local} bytes, root {root} sent {remote}")]
    LengthMismatch {
        root: Rank,
        local: usize,
        remote: usize,
    },

    /// A root or destination rank outside the group.
    #[error("rank {rank} is out of range for a group of size {size}")]
    InvalidRank { rank: Rank, size: usize },

    /// A peer went away without aborting.
    #[error("rank {0} disconnected")]
    Disconnected(Rank),

    /// Value encoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Value decoding failed.
    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for communication operations.
pub type Result<T> = std::result::Result<T, CommError>;
