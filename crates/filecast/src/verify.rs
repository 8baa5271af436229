//! Post-transfer consistency check.
//!
//! Every member digests its own copy, the digests are gathered to the
//! coordinator, and the coordinator decides whether the group agrees. The
//! verdict is broadcast back so that every member returns the same outcome.
//! Nothing is rolled back on a mismatch.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use filecast_comm::{Communicator, CommunicatorExt};
use filecast_core::{FileDigest, Rank};
use filecast_store::FileStore;
use tracing::{error, info, warn};

use crate::error::{Fatal, FatalResult};

const VERDICT_MISMATCH: u8 = 0;
const VERDICT_OK: u8 = 1;

/// Every member's digest, indexed by rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestTable {
    root: Rank,
    entries: Vec<Option<FileDigest>>,
}

impl DigestTable {
    pub fn new(root: Rank, entries: Vec<Option<FileDigest>>) -> Self {
        Self { root, entries }
    }

    pub fn root(&self) -> Rank {
        self.root
    }

    pub fn entries(&self) -> &[Option<FileDigest>] {
        &self.entries
    }

    /// The distinct digests reported, ignoring members without a file.
    pub fn distinct(&self) -> BTreeSet<&FileDigest> {
        self.entries.iter().flatten().collect()
    }

    /// Exactly one distinct digest was reported.
    pub fn is_consistent(&self) -> bool {
        self.distinct().len() == 1
    }

    /// Ranks whose digest differs from the root's.
    pub fn divergent_ranks(&self) -> Vec<Rank> {
        let expected = self.entries.get(self.root.index()).copied().flatten();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, digest)| **digest != expected)
            .map(|(index, _)| Rank::new(index))
            .collect()
    }
}

impl fmt::Display for DigestTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, digest) in self.entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let marker = if Rank::new(index) == self.root { "*" } else { " " };
            match digest {
                Some(digest) => write!(f, "{marker} Rank {index:>4}: {digest}")?,
                None => write!(f, "{marker} Rank {index:>4}: N/A")?,
            }
        }
        Ok(())
    }
}

/// Compare every member's copy against the rest of the group.
///
/// Returns this member's digest when the whole group agrees.
pub(crate) async fn verify_copies<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    root: Rank,
) -> FatalResult<Option<FileDigest>>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let rank = comm.rank();

    let local = store.digest(path).await?;
    if local.is_none() {
        warn!(rank = %rank, path = %path.display(), "no local file to checksum");
    }

    let gathered = comm.gather_value(&local, Rank::COORDINATOR).await?;
    let table = gathered.map(|entries| DigestTable::new(root, entries));

    let mut verdict = [VERDICT_MISMATCH];
    if let Some(table) = &table {
        if table.is_consistent() {
            info!(rank = %rank, "Checksum OK");
            verdict[0] = VERDICT_OK;
        } else {
            error!(rank = %rank, "checksum mismatch\n{table}");
        }
    }
    comm.broadcast(&mut verdict, Rank::COORDINATOR).await?;

    if verdict[0] == VERDICT_OK {
        Ok(local)
    } else {
        Err(Fatal::ChecksumMismatch { table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_comm::MemoryGroup;
    use filecast_store::MemoryStore;

    /// Run `verify_copies` on every member, each holding the given contents.
    async fn verify_group(files: Vec<&'static str>) -> Vec<FatalResult<Option<FileDigest>>> {
        let handles: Vec<_> = MemoryGroup::new(files.len())
            .into_iter()
            .zip(files)
            .map(|(comm, contents)| {
                tokio::spawn(async move {
                    let store = MemoryStore::with_file("f", contents.as_bytes());
                    verify_copies(&comm, &store, Path::new("f"), Rank(0)).await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    fn digest(data: &[u8]) -> Option<FileDigest> {
        Some(FileDigest::hash(data))
    }

    #[test]
    fn test_agreeing_table() {
        let table = DigestTable::new(Rank(0), vec![digest(b"a"), digest(b"a"), digest(b"a")]);
        assert!(table.is_consistent());
        assert!(table.divergent_ranks().is_empty());
    }

    #[test]
    fn test_one_divergent_rank() {
        let table = DigestTable::new(Rank(1), vec![digest(b"a"), digest(b"a"), digest(b"b")]);
        assert!(!table.is_consistent());
        assert_eq!(table.distinct().len(), 2);
        assert_eq!(table.divergent_ranks(), vec![Rank(2)]);
    }

    #[test]
    fn test_absent_digests_are_not_distinct() {
        let table = DigestTable::new(Rank(0), vec![digest(b"a"), None]);
        assert!(table.is_consistent());
        assert_eq!(table.divergent_ranks(), vec![Rank(1)]);
    }

    #[test]
    fn test_no_digests_is_inconsistent() {
        let table = DigestTable::new(Rank(0), vec![None, None]);
        assert!(!table.is_consistent());
    }

    #[test]
    fn test_display_lists_every_rank() {
        let table = DigestTable::new(Rank(0), vec![digest(b"a"), None]);
        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* Rank    0: "));
        assert!(lines[0].ends_with(&FileDigest::hash(b"a").to_hex()));
        assert_eq!(lines[1], "  Rank    1: N/A");
    }

    #[tokio::test]
    async fn test_matching_copies_return_local_digest() {
        let results = verify_group(vec!["same", "same", "same"]).await;
        for result in results {
            assert_eq!(result.unwrap(), digest(b"same"));
        }
    }

    #[tokio::test]
    async fn test_mismatch_table_holds_divergent_digest() {
        let results = verify_group(vec!["original", "original", "corrupted"]).await;
        let bad = FileDigest::hash(b"corrupted");

        match &results[0] {
            Err(Fatal::ChecksumMismatch { table: Some(table) }) => {
                assert_eq!(table.entries()[2], Some(bad));
                assert_eq!(table.divergent_ranks(), vec![Rank(2)]);
                assert!(table.to_string().contains(&bad.to_hex()));
            }
            other => panic!("expected a mismatch table, got {other:?}"),
        }
        for result in &results[1..] {
            assert!(matches!(
                result,
                Err(Fatal::ChecksumMismatch { table: None })
            ));
        }
    }
}
