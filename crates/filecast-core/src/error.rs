//! Error types for filecast core.

use thiserror::Error;

use crate::types::Rank;

/// Configuration errors.
///
/// These are detected from locally visible arguments, identically on every
/// member, before any collective call is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot parse chunk size: \"{0}\"")]
    InvalidChunkSize(String),

    #[error("chunk size \"{0}\" does not fit in 64 bits")]
    ChunkSizeOverflow(String),

    #[error("chunk size must not be negative: {0}")]
    NegativeChunkSize(i64),

    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk size of {0} bytes does not fit in memory on this platform")]
    ChunkSizeTooLarge(u64),

    #[error("one of --auto, --size, --checksum-prefix, --rank or --hostname must be specified")]
    MissingStrategy,

    #[error("only one of --auto, --size, --checksum-prefix, --rank or --hostname may be specified, got {}", .0.join(", "))]
    ConflictingStrategies(Vec<&'static str>),

    #[error("root rank {rank} is out of range for a group of size {size}")]
    RankOutOfRange { rank: Rank, size: usize },

    #[error("checksum prefix must not be empty")]
    EmptyChecksumPrefix,

    #[error("checksum prefix must be hexadecimal: \"{0}\"")]
    InvalidChecksumPrefix(String),

    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("a group of size {0} has nothing to transfer")]
    GroupTooSmall(usize),
}

/// Errors raised while reducing the gathered election reports.
///
/// Every member reduces the same gathered vector, so every member raises
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElectionError {
    #[error("no rank has the file to be broadcast")]
    NoSource,

    #[error("--auto is specified but multiple ranks have the file: {ranks:?}")]
    MultipleSources { ranks: Vec<Rank> },

    #[error("root rank {root} does not have the file")]
    RootLacksFile { root: Rank },

    #[error("no rank has a file whose checksum starts with '{prefix}'")]
    NoChecksumMatch { prefix: String },

    #[error("no such hostname: {0}")]
    NoSuchHost(String),

    #[error("multiple ranks have the hostname \"{host}\": {ranks:?}")]
    AmbiguousHost { host: String, ranks: Vec<Rank> },

    #[error("no election report from rank {0}")]
    MissingReport(Rank),

    #[error("rank {0} sent a report that does not match the election strategy")]
    UnexpectedReport(Rank),
}
