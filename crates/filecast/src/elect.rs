//! Root election over the group.

use std::path::Path;

use filecast_comm::{Communicator, CommunicatorExt};
use filecast_core::{ElectionStrategy, LocalFacts, Rank};
use filecast_store::FileStore;
use tracing::{debug, info};

use crate::error::FatalResult;

/// Agree on the rank that holds the authoritative file.
///
/// Every member issues exactly one all-gather, whatever the strategy:
/// the local observation is strategy-specific, the exchange is not, and
/// the reduction is a pure function of the gathered reports. Every member
/// therefore returns the same rank or the same error.
pub(crate) async fn elect_root<C, S>(
    comm: &C,
    store: &S,
    strategy: &ElectionStrategy,
    path: &Path,
    hostname: &str,
) -> FatalResult<Rank>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let rank = comm.rank();

    let size = store.size(path).await?;
    let digest = match size {
        Some(_) if strategy.needs_digest() => store.digest(path).await?,
        _ => None,
    };

    let facts = LocalFacts {
        size,
        digest: digest.as_ref(),
        hostname,
    };
    let report = strategy.observe(&facts);
    debug!(rank = %rank, strategy = %strategy, ?report, "election report");

    let reports = comm.all_gather_value(&report).await?;
    let root = strategy.reduce(&reports)?;

    if rank == root {
        info!(rank = %rank, strategy = %strategy, "rank {} is root", root);
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_comm::MemoryGroup;
    use filecast_core::{ElectionError, FileDigest};
    use filecast_store::MemoryStore;

    use crate::error::Fatal;

    /// Run one election with per-rank file contents and hostnames.
    async fn elect(
        strategy: ElectionStrategy,
        files: Vec<Option<Vec<u8>>>,
        hosts: Vec<&'static str>,
    ) -> Vec<FatalResult<Rank>> {
        let handles: Vec<_> = MemoryGroup::new(files.len())
            .into_iter()
            .zip(files.into_iter().zip(hosts))
            .map(|(comm, (contents, host))| {
                let strategy = strategy.clone();
                tokio::spawn(async move {
                    let store = MemoryStore::new();
                    if let Some(contents) = contents {
                        store.insert("f", contents);
                    }
                    let result = elect_root(&comm, &store, &strategy, Path::new("f"), host).await;
                    if result.is_err() {
                        comm.abort(1).await;
                    }
                    result
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    fn roots(results: &[FatalResult<Rank>]) -> Vec<Rank> {
        results.iter().map(|r| *r.as_ref().unwrap()).collect()
    }

    #[tokio::test]
    async fn test_largest_size_ties_go_to_lowest_rank() {
        let results = elect(
            ElectionStrategy::ByLargestSize,
            vec![Some(vec![0; 100]), Some(vec![1; 100]), Some(vec![2; 50])],
            vec!["a", "b", "c"],
        )
        .await;
        assert_eq!(roots(&results), vec![Rank(0); 3]);
    }

    #[tokio::test]
    async fn test_checksum_prefix_uses_local_file() {
        let prefix = FileDigest::hash(b"second").to_hex()[..6].to_uppercase();
        let results = elect(
            ElectionStrategy::ByChecksumPrefix(prefix),
            vec![Some(b"first".to_vec()), None, Some(b"second".to_vec())],
            vec!["a", "b", "c"],
        )
        .await;
        assert_eq!(roots(&results), vec![Rank(2); 3]);
    }

    #[tokio::test]
    async fn test_hostname() {
        let results = elect(
            ElectionStrategy::ByHostname("node-b".to_string()),
            vec![None, Some(b"x".to_vec()), None],
            vec!["node-a", "node-b", "node-c"],
        )
        .await;
        assert_eq!(roots(&results), vec![Rank(1); 3]);
    }

    #[tokio::test]
    async fn test_ambiguous_hostname_fails_everywhere() {
        let results = elect(
            ElectionStrategy::ByHostname("node".to_string()),
            vec![None, None],
            vec!["node", "node"],
        )
        .await;
        for result in results {
            assert!(matches!(
                result,
                Err(Fatal::Election(ElectionError::AmbiguousHost { .. }))
            ));
        }
    }

    #[tokio::test]
    async fn test_auto_without_files_fails_everywhere() {
        let results = elect(
            ElectionStrategy::ByAuto,
            vec![None, None, None],
            vec!["a", "b", "c"],
        )
        .await;
        for result in results {
            assert!(matches!(
                result,
                Err(Fatal::Election(ElectionError::NoSource))
            ));
        }
    }

    #[tokio::test]
    async fn test_by_rank_without_file_fails_everywhere() {
        let results = elect(
            ElectionStrategy::ByRank(Rank(1)),
            vec![Some(b"x".to_vec()), None],
            vec!["a", "b"],
        )
        .await;
        for result in results {
            assert!(matches!(
                result,
                Err(Fatal::Election(ElectionError::RootLacksFile { root: Rank(1) }))
            ));
        }
    }
}
