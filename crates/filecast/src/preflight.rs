//! Destination checks before any data moves.

use std::path::Path;

use filecast_comm::{Communicator, CommunicatorExt};
use filecast_core::Rank;
use filecast_store::FileStore;
use tracing::{debug, warn};

use crate::config::OverwritePolicy;
use crate::error::{Fatal, FatalResult};

/// Refuse to clobber existing destinations unless overwriting is allowed.
///
/// Each non-root reports whether its destination is in the way. The
/// verdict is shared with one all-gather so that a conflict on any rank
/// fails every rank the same way.
pub(crate) async fn check_destinations<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    root: Rank,
    overwrite: OverwritePolicy,
) -> FatalResult<()>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let rank = comm.rank();
    let exists = rank != root && store.exists(path).await?;

    let conflict = exists && overwrite == OverwritePolicy::Refuse;
    if conflict {
        warn!(rank = %rank, path = %path.display(), "destination file already exists");
    } else if exists {
        debug!(rank = %rank, path = %path.display(), "replacing existing destination");
    }

    let conflicts: Vec<bool> = comm.all_gather_value(&conflict).await?;
    let ranks: Vec<Rank> = conflicts
        .iter()
        .enumerate()
        .filter(|(_, conflict)| **conflict)
        .map(|(index, _)| Rank::new(index))
        .collect();

    if ranks.is_empty() {
        Ok(())
    } else {
        Err(Fatal::DestinationExists { ranks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_comm::MemoryGroup;
    use filecast_store::MemoryStore;

    async fn preflight(
        existing: Vec<bool>,
        overwrite: OverwritePolicy,
    ) -> Vec<FatalResult<()>> {
        let handles: Vec<_> = MemoryGroup::new(existing.len())
            .into_iter()
            .zip(existing)
            .map(|(comm, exists)| {
                tokio::spawn(async move {
                    let store = MemoryStore::new();
                    if exists {
                        store.insert("f", b"old");
                    }
                    check_destinations(&comm, &store, Path::new("f"), Rank(0), overwrite).await
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn test_root_file_is_not_a_conflict() {
        let results = preflight(vec![true, false, false], OverwritePolicy::Refuse).await;
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_conflict_fails_every_rank() {
        let results = preflight(vec![true, false, true], OverwritePolicy::Refuse).await;
        for result in results {
            match result {
                Err(Fatal::DestinationExists { ranks }) => assert_eq!(ranks, vec![Rank(2)]),
                other => panic!("expected DestinationExists, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_overwrite_allowed() {
        let results = preflight(vec![true, true, true], OverwritePolicy::Allow).await;
        assert!(results.iter().all(|r| r.is_ok()));
    }
}
