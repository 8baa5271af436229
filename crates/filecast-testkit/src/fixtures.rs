//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a whole in-process group, each
//! member with its own file store, run to completion.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use tempfile::TempDir;

use filecast::{CastConfig, RunOutcome, Session};
use filecast_comm::MemoryGroup;
use filecast_core::{ElectionStrategy, Rank};
use filecast_store::{DiskStore, FileStore, MemoryStore};

/// File name used by the in-memory fixture.
pub const MEMORY_FILE: &str = "data.bin";

/// Run one session per store, concurrently, and collect the outcomes by rank.
///
/// `hostnames`, when given, overrides the hostname each member reports.
pub async fn run_group<S>(
    stores: Vec<S>,
    config: CastConfig,
    hostnames: Option<Vec<String>>,
) -> Vec<RunOutcome>
where
    S: FileStore + 'static,
{
    let size = stores.len();
    let mut hostnames = hostnames.map(|names| names.into_iter());

    let handles: Vec<_> = MemoryGroup::new(size)
        .into_iter()
        .zip(stores)
        .map(|(comm, store)| {
            let mut session = Session::new(comm, store, config.clone());
            if let Some(host) = hostnames.as_mut().and_then(Iterator::next) {
                session = session.with_hostname(host);
            }
            tokio::spawn(async move { session.execute().await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(size);
    for handle in handles {
        outcomes.push(handle.await.expect("member task panicked"));
    }
    outcomes
}

/// A group whose members keep their files in memory.
pub struct MemoryGroupFixture {
    pub stores: Vec<MemoryStore>,
    pub hostnames: Option<Vec<String>>,
}

impl MemoryGroupFixture {
    /// Create a group of `size` members, none of which has the file.
    pub fn new(size: usize) -> Self {
        Self {
            stores: (0..size).map(|_| MemoryStore::new()).collect(),
            hostnames: None,
        }
    }

    /// Give `rank` a copy of the file.
    pub fn with_file(self, rank: usize, contents: impl AsRef<[u8]>) -> Self {
        self.stores[rank].insert(MEMORY_FILE, contents);
        self
    }

    /// Give every member an explicit hostname.
    pub fn with_hostnames<I, H>(mut self, hostnames: I) -> Self
    where
        I: IntoIterator<Item = H>,
        H: Into<String>,
    {
        self.hostnames = Some(hostnames.into_iter().map(Into::into).collect());
        self
    }

    pub fn store(&self, rank: usize) -> &MemoryStore {
        &self.stores[rank]
    }

    /// Contents of `rank`'s file.
    pub fn contents(&self, rank: usize) -> Option<Vec<u8>> {
        self.stores[rank]
            .contents(Path::new(MEMORY_FILE))
            .map(|bytes| bytes.to_vec())
    }

    /// A configuration for this fixture's file.
    pub fn config(&self, strategy: ElectionStrategy) -> CastConfig {
        CastConfig::new(MEMORY_FILE, strategy)
    }

    /// Run the group. The stores are shared, so results stay inspectable.
    pub async fn run(&self, config: CastConfig) -> Vec<RunOutcome> {
        run_group(self.stores.clone(), config, self.hostnames.clone()).await
    }
}

/// A group whose members each have their own directory on disk.
pub struct DiskGroupFixture {
    pub dir: TempDir,
    pub size: usize,
}

impl DiskGroupFixture {
    /// Create a temporary directory with one subdirectory per rank.
    pub fn new(size: usize) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        for rank in 0..size {
            fs::create_dir_all(dir.path().join(rank.to_string()))
                .expect("failed to create rank dir");
        }
        Self { dir, size }
    }

    /// The path template shared by every member.
    pub fn template(&self) -> PathBuf {
        self.dir.path().join("{rank}").join("data.bin")
    }

    /// The file of one member.
    pub fn path(&self, rank: usize) -> PathBuf {
        self.dir.path().join(rank.to_string()).join("data.bin")
    }

    pub fn write(&self, rank: usize, contents: impl AsRef<[u8]>) {
        fs::write(self.path(rank), contents).expect("failed to write fixture file");
    }

    pub fn read(&self, rank: usize) -> Option<Vec<u8>> {
        fs::read(self.path(rank)).ok()
    }

    /// A configuration for this fixture's path template.
    pub fn config(&self, strategy: ElectionStrategy) -> CastConfig {
        CastConfig::new(self.template(), strategy)
    }

    /// Run the group against the local disk.
    pub async fn run(&self, config: CastConfig) -> Vec<RunOutcome> {
        let stores = (0..self.size).map(|_| DiskStore::new()).collect();
        run_group(stores, config, None).await
    }
}

/// Random file contents of the given length.
pub fn random_contents(len: usize) -> Vec<u8> {
    let mut contents = vec![0u8; len];
    rand::thread_rng().fill(&mut contents[..]);
    contents
}

/// The root every successful outcome agrees on.
///
/// Panics if any member failed or the members disagree.
pub fn agreed_root(outcomes: &[RunOutcome]) -> Rank {
    let roots: Vec<Rank> = outcomes
        .iter()
        .map(|outcome| match outcome {
            RunOutcome::Success(report) => report.root,
            other => panic!("member failed: {other:?}"),
        })
        .collect();
    assert!(
        roots.windows(2).all(|pair| pair[0] == pair[1]),
        "members disagree on the root: {roots:?}"
    );
    roots[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_fixture_round_trip() {
        let contents = random_contents(1000);
        let fixture = MemoryGroupFixture::new(3).with_file(2, &contents);
        let config = fixture.config(ElectionStrategy::ByAuto).with_chunk_size(64);

        let outcomes = fixture.run(config).await;

        assert_eq!(agreed_root(&outcomes), Rank(2));
        for rank in 0..3 {
            assert_eq!(fixture.contents(rank).unwrap(), contents);
        }
    }

    #[test]
    fn test_disk_fixture_paths_are_per_rank() {
        let fixture = DiskGroupFixture::new(2);
        fixture.write(0, b"hello");

        let config = fixture.config(ElectionStrategy::ByAuto);
        assert_eq!(config.local_path(Rank(1)), fixture.path(1));
        assert_eq!(fixture.read(0).unwrap(), b"hello");
        assert_eq!(fixture.read(1), None);
    }

    #[tokio::test]
    async fn test_hostnames_are_applied() {
        let fixture = MemoryGroupFixture::new(2)
            .with_file(1, b"x")
            .with_hostnames(["login", "compute"]);
        let config = fixture.config(ElectionStrategy::ByHostname("compute".to_string()));

        let outcomes = fixture.run(config).await;
        assert_eq!(agreed_root(&outcomes), Rank(1));
    }
}
