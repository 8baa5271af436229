//! Error types for a filecast run.
//!
//! Configuration errors are detected locally and identically on every
//! member before any collective call, so they are returned as-is. Every
//! other failure leaves the group in an unknown state and is wrapped in a
//! [`FatalGroupError`], which the session turns into a group abort.

use std::fmt;

use filecast_comm::CommError;
use filecast_core::{ConfigError, ElectionError, Rank};
use filecast_store::StoreError;
use thiserror::Error;

use crate::verify::DigestTable;

/// Exit code of a successful run.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of any failure without a more specific code.
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when a destination exists and overwriting was not allowed.
pub const EXIT_DESTINATION_EXISTS: i32 = 2;

/// Coarse classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Election,
    SourceMissing,
    DestinationConflict,
    Io,
    ChecksumMismatch,
    Communication,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Election => "election",
            ErrorKind::SourceMissing => "source missing",
            ErrorKind::DestinationConflict => "destination conflict",
            ErrorKind::Io => "I/O",
            ErrorKind::ChecksumMismatch => "checksum mismatch",
            ErrorKind::Communication => "communication",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The cause of a fatal group error.
#[derive(Debug, Error)]
pub enum Fatal {
    /// The group could not agree on a root.
    #[error("election failed: {0}")]
    Election(#[from] ElectionError),

    /// Some non-root destination already exists.
    #[error("destination file already exists on rank(s) {}; use --force-overwrite to replace it", join_ranks(.ranks))]
    DestinationExists { ranks: Vec<Rank> },

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] StoreError),

    /// The copies differ after the transfer.
    ///
    /// Only the coordinator holds the per-rank table.
    #[error("checksum mismatch{}", mismatch_detail(.table))]
    ChecksumMismatch { table: Option<DigestTable> },

    /// The substrate failed, or another member aborted the group.
    #[error("communication error: {0}")]
    Comm(#[from] CommError),
}

fn join_ranks(ranks: &[Rank]) -> String {
    ranks
        .iter()
        .map(Rank::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn mismatch_detail(table: &Option<DigestTable>) -> String {
    match table {
        Some(table) => format!(
            " on rank(s) {}\n{table}",
            join_ranks(&table.divergent_ranks())
        ),
        None => format!(" reported by rank {}", Rank::COORDINATOR),
    }
}

impl Fatal {
    /// Classify this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Fatal::Election(ElectionError::RootLacksFile { .. }) => ErrorKind::SourceMissing,
            Fatal::Election(_) => ErrorKind::Election,
            Fatal::DestinationExists { .. } => ErrorKind::DestinationConflict,
            Fatal::Io(_) => ErrorKind::Io,
            Fatal::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Fatal::Comm(_) => ErrorKind::Communication,
        }
    }

    /// The process exit code for this failure.
    ///
    /// A member that observes another member's abort exits with the code
    /// that member aborted with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Fatal::DestinationExists { .. } => EXIT_DESTINATION_EXISTS,
            Fatal::Comm(CommError::Aborted { code, .. }) => *code,
            _ => EXIT_FAILURE,
        }
    }

    /// Whether the group has already been aborted by someone else.
    pub fn is_abort(&self) -> bool {
        matches!(self, Fatal::Comm(CommError::Aborted { .. }))
    }

    /// Attach the rank that observed this failure.
    pub fn at(self, rank: Rank) -> FatalGroupError {
        FatalGroupError { rank, cause: self }
    }
}

/// A failure that requires aborting the whole group.
#[derive(Debug, Error)]
#[error("rank {rank}: {cause}")]
pub struct FatalGroupError {
    pub rank: Rank,
    #[source]
    pub cause: Fatal,
}

impl FatalGroupError {
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    pub fn exit_code(&self) -> i32 {
        self.cause.exit_code()
    }
}

/// Errors returned by a filecast run.
#[derive(Debug, Error)]
pub enum CastError {
    /// Invalid arguments, rejected before any collective call.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure that aborts the group.
    #[error(transparent)]
    Fatal(#[from] FatalGroupError),
}

impl CastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CastError::Config(_) => ErrorKind::Configuration,
            CastError::Fatal(e) => e.kind(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            CastError::Config(_) => EXIT_FAILURE,
            CastError::Fatal(e) => e.exit_code(),
        }
    }
}

/// Result type for a whole run.
pub type Result<T> = std::result::Result<T, CastError>;

/// Result type for the collective phases of a run.
pub(crate) type FatalResult<T> = std::result::Result<T, Fatal>;

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_core::FileDigest;

    #[test]
    fn test_exit_codes() {
        let exists = Fatal::DestinationExists {
            ranks: vec![Rank(2)],
        };
        assert_eq!(exists.exit_code(), EXIT_DESTINATION_EXISTS);
        assert_eq!(exists.kind(), ErrorKind::DestinationConflict);

        let election = Fatal::Election(ElectionError::NoSource);
        assert_eq!(election.exit_code(), EXIT_FAILURE);
        assert_eq!(election.kind(), ErrorKind::Election);

        let config = CastError::Config(ConfigError::ZeroChunkSize);
        assert_eq!(config.exit_code(), EXIT_FAILURE);
        assert_eq!(config.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_messages_list_plain_ranks() {
        let exists = Fatal::DestinationExists {
            ranks: vec![Rank(1), Rank(3)],
        };
        assert!(exists.to_string().contains("on rank(s) 1, 3;"));

        let table = DigestTable::new(
            Rank(0),
            vec![
                Some(FileDigest::hash(b"a")),
                Some(FileDigest::hash(b"a")),
                Some(FileDigest::hash(b"b")),
            ],
        );
        let mismatch = Fatal::ChecksumMismatch { table: Some(table) }.to_string();
        assert!(mismatch.starts_with("checksum mismatch on rank(s) 2\n"));
        assert!(mismatch.contains(&FileDigest::hash(b"b").to_hex()));
        assert!(!mismatch.contains("Rank(2)"));
    }

    #[test]
    fn test_root_lacking_file_is_source_missing() {
        let fatal = Fatal::Election(ElectionError::RootLacksFile { root: Rank(1) });
        assert_eq!(fatal.kind(), ErrorKind::SourceMissing);
    }

    #[test]
    fn test_observed_abort_keeps_aborter_code() {
        let fatal = Fatal::Comm(CommError::Aborted {
            by: Rank(3),
            code: EXIT_DESTINATION_EXISTS,
        });
        assert!(fatal.is_abort());
        assert_eq!(fatal.exit_code(), EXIT_DESTINATION_EXISTS);
        assert_eq!(fatal.kind(), ErrorKind::Communication);
    }

    #[test]
    fn test_fatal_group_error_message_is_rank_tagged() {
        let err = CastError::from(Fatal::Election(ElectionError::NoSource).at(Rank(4)));
        assert!(err.to_string().starts_with("rank 4: "));
        assert_eq!(err.kind(), ErrorKind::Election);
    }
}
