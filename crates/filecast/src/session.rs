//! The Session: one member's view of a filecast run.
//!
//! A session brings together the group communicator, the member's local
//! file store and the run configuration, and drives the collective phases
//! in the same order on every member.

use std::fmt;
use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use filecast_comm::Communicator;
use filecast_core::{ByteSize, FileDigest, Rank};
use filecast_store::FileStore;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::CastConfig;
use crate::error::{CastError, ErrorKind, FatalResult, Result, EXIT_SUCCESS};
use crate::inventory::local_hostname;
use crate::{elect, inventory, preflight, transfer, verify};

/// What one member did during a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastReport {
    /// This member's rank.
    pub rank: Rank,
    /// The elected root.
    pub root: Rank,
    /// File size in bytes.
    pub bytes: u64,
    /// Number of chunks broadcast.
    pub chunks: u64,
    /// This member's digest, when the copies were verified.
    pub digest: Option<FileDigest>,
    pub elapsed: Duration,
}

impl CastReport {
    pub fn is_root(&self) -> bool {
        self.rank == self.root
    }
}

impl fmt::Display for CastReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} chunk(s) from rank {} in {:.2?}",
            ByteSize(self.bytes),
            self.chunks,
            self.root,
            self.elapsed
        )?;
        if let Some(digest) = &self.digest {
            write!(f, ", checksum {digest}")?;
        }
        Ok(())
    }
}

/// The result of a run, ready to be turned into a process exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success(CastReport),
    Failure {
        kind: ErrorKind,
        message: String,
        exit_code: i32,
    },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success(_) => EXIT_SUCCESS,
            RunOutcome::Failure { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RunOutcome::Success(_) => None,
            RunOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// One member of a filecast run.
pub struct Session<C: Communicator, S: FileStore> {
    /// The group this member belongs to.
    comm: C,
    /// This member's own file view.
    store: S,
    config: CastConfig,
    /// Hostname used by hostname election and the inventory.
    hostname: String,
}

impl<C: Communicator, S: FileStore> Session<C, S> {
    /// Create a session for this member.
    pub fn new(comm: C, store: S, config: CastConfig) -> Self {
        Self {
            comm,
            store,
            config,
            hostname: local_hostname(),
        }
    }

    /// Override the hostname this member reports.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn rank(&self) -> Rank {
        self.comm.rank()
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CastConfig {
        &self.config
    }

    /// The path this member reads or writes.
    pub fn local_path(&self) -> PathBuf {
        self.config.local_path(self.rank())
    }

    /// Run the whole pipeline on this member.
    ///
    /// Configuration errors are returned before any collective call.
    /// Collective failures come back as [`CastError::Fatal`]; the group has
    /// not been aborted yet, see [`Session::execute`].
    pub async fn run(&self) -> Result<CastReport> {
        let chunk_size = self.config.validate(self.comm.size())?;
        self.run_collective(chunk_size)
            .await
            .map_err(|cause| CastError::Fatal(cause.at(self.rank())))
    }

    /// Run the pipeline and map the result to an outcome.
    ///
    /// A fatal error aborts the whole group with the error's exit code,
    /// unless it is itself the observation of someone else's abort.
    pub async fn execute(&self) -> RunOutcome {
        let span = info_span!("filecast", rank = %self.rank());
        async {
            match self.run().await {
                Ok(report) => {
                    info!(rank = %report.rank, "done: {report}");
                    RunOutcome::Success(report)
                }
                Err(err) => {
                    let exit_code = err.exit_code();
                    match &err {
                        CastError::Fatal(fatal) if fatal.cause.is_abort() => {
                            warn!(rank = %self.rank(), "{err}");
                        }
                        CastError::Fatal(_) => {
                            error!(rank = %self.rank(), "{err}");
                            self.comm.abort(exit_code).await;
                        }
                        CastError::Config(_) => {
                            error!(rank = %self.rank(), "{err}");
                        }
                    }
                    RunOutcome::Failure {
                        kind: err.kind(),
                        message: err.to_string(),
                        exit_code,
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Collective phases
    // ─────────────────────────────────────────────────────────────────────────

    async fn run_collective(&self, chunk_size: NonZeroU64) -> FatalResult<CastReport> {
        let started = Instant::now();
        let rank = self.rank();
        let path = self.local_path();

        let root = elect::elect_root(
            &self.comm,
            &self.store,
            &self.config.strategy,
            &path,
            &self.hostname,
        )
        .await?;

        preflight::check_destinations(&self.comm, &self.store, &path, root, self.config.overwrite)
            .await?;

        inventory::report_inventory(&self.comm, &self.store, &path, root, &self.hostname).await?;

        let plan = transfer::transfer(&self.comm, &self.store, &path, root, chunk_size).await?;
        self.comm.barrier().await?;

        let digest = if self.config.verify_checksum {
            verify::verify_copies(&self.comm, &self.store, &path, root).await?
        } else {
            None
        };

        Ok(CastReport {
            rank,
            root,
            bytes: plan.file_size(),
            chunks: plan.chunk_count(),
            digest,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_comm::MemoryGroup;
    use filecast_core::{ConfigError, ElectionStrategy};
    use filecast_store::MemoryStore;

    use crate::error::EXIT_FAILURE;

    #[tokio::test]
    async fn test_config_error_does_not_touch_the_group() {
        let mut group = MemoryGroup::new(2);
        let comm = group.remove(0);
        let config = CastConfig::new("f", ElectionStrategy::ByRank(Rank(9)));
        let session = Session::new(comm, MemoryStore::new(), config);

        let err = session.run().await.unwrap_err();
        assert!(matches!(
            err,
            CastError::Config(ConfigError::RankOutOfRange { .. })
        ));

        let outcome = session.execute().await;
        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(outcome.kind(), Some(ErrorKind::Configuration));
        assert_eq!(session.comm().abort_signal(), None);
    }

    #[tokio::test]
    async fn test_round_trip_reports() {
        let contents = b"lock-step broadcast".to_vec();
        let handles: Vec<_> = MemoryGroup::new(3)
            .into_iter()
            .map(|comm| {
                let store = MemoryStore::new();
                if comm.rank() == Rank(0) {
                    store.insert("f", &contents);
                }
                let config = CastConfig::new("f", ElectionStrategy::ByAuto).with_chunk_size(4);
                tokio::spawn(async move { Session::new(comm, store, config).execute().await })
            })
            .collect();

        for handle in handles {
            match handle.await.unwrap() {
                RunOutcome::Success(report) => {
                    assert_eq!(report.root, Rank(0));
                    assert_eq!(report.bytes, 19);
                    assert_eq!(report.chunks, 5);
                    assert_eq!(report.digest, Some(FileDigest::hash(&contents)));
                }
                other => panic!("expected success, got {other:?}"),
            }
        }
    }
}
