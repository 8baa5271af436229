//! Chunked broadcast of the file from the root to every other member.
//!
//! The root announces the file size with one 8-byte broadcast. Every
//! member then derives the same [`ChunkPlan`] from that size and its own
//! (identical) chunk size, and the group walks the chunks in lock-step:
//! one broadcast per chunk, in index order, each exactly as long as the
//! plan says.

use std::num::NonZeroU64;
use std::path::Path;

use filecast_comm::{Communicator, CommunicatorExt};
use filecast_core::{ChunkPlan, Rank};
use filecast_store::{FileStore, StoreError};
use tracing::{debug, info};

use crate::error::FatalResult;

/// Send (on the root) or receive (everywhere else) the file.
pub(crate) async fn transfer<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    root: Rank,
    chunk_size: NonZeroU64,
) -> FatalResult<ChunkPlan>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    if comm.is_rank(root) {
        send_file(comm, store, path, chunk_size).await
    } else {
        recv_file(comm, store, path, root, chunk_size).await
    }
}

/// Length of the reusable chunk buffer.
///
/// Bounded by the chunk size, which was checked to fit in `usize`.
fn buffer_len(plan: &ChunkPlan) -> usize {
    plan.max_chunk_len() as usize
}

async fn send_file<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    chunk_size: NonZeroU64,
) -> FatalResult<ChunkPlan>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let rank = comm.rank();

    let file_size = store
        .size(path)
        .await?
        .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))?;
    let mut reader = store.open_reader(path).await?;

    let file_size = comm.broadcast_u64(file_size, rank).await?;
    let plan = ChunkPlan::new(file_size, chunk_size);
    info!(
        rank = %rank,
        size = file_size,
        chunks = plan.chunk_count(),
        "sending {}",
        path.display()
    );

    let mut buf = vec![0u8; buffer_len(&plan)];
    for chunk in plan.chunks() {
        let chunk_buf = &mut buf[..chunk.len as usize];
        reader.read_chunk(chunk_buf).await?;
        comm.broadcast(chunk_buf, rank).await?;
        debug!(
            rank = %rank,
            chunk = chunk.index + 1,
            of = plan.chunk_count(),
            bytes = chunk.len,
            "sent chunk"
        );
    }

    Ok(plan)
}

async fn recv_file<C, S>(
    comm: &C,
    store: &S,
    path: &Path,
    root: Rank,
    chunk_size: NonZeroU64,
) -> FatalResult<ChunkPlan>
where
    C: Communicator + ?Sized,
    S: FileStore + ?Sized,
{
    let rank = comm.rank();

    let file_size = comm.broadcast_u64(0, root).await?;
    let plan = ChunkPlan::new(file_size, chunk_size);
    debug!(
        rank = %rank,
        size = file_size,
        chunks = plan.chunk_count(),
        "receiving into {}",
        path.display()
    );

    // Created even for an empty file.
    let mut writer = store.create_writer(path).await?;

    let mut buf = vec![0u8; buffer_len(&plan)];
    for chunk in plan.chunks() {
        let chunk_buf = &mut buf[..chunk.len as usize];
        comm.broadcast(chunk_buf, root).await?;
        writer.write_chunk(chunk_buf).await?;
        debug!(
            rank = %rank,
            chunk = chunk.index + 1,
            of = plan.chunk_count(),
            from = %root,
            "received chunk"
        );
    }
    writer.finish().await?;

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filecast_comm::{CommError, MemoryGroup};
    use filecast_store::MemoryStore;

    use crate::error::Fatal;

    /// Transfer `contents` from `root` to every other member of a group.
    async fn run(
        size: usize,
        root: Rank,
        contents: Vec<u8>,
        chunk_size: u64,
        stores: Vec<MemoryStore>,
    ) -> Vec<FatalResult<ChunkPlan>> {
        let chunk_size = NonZeroU64::new(chunk_size).unwrap();
        stores[root.index()].insert("f", &contents);

        let handles: Vec<_> = MemoryGroup::new(size)
            .into_iter()
            .zip(stores)
            .map(|(comm, store)| {
                tokio::spawn(async move {
                    let result = transfer(&comm, &store, Path::new("f"), root, chunk_size).await;
                    if let Err(err) = &result {
                        if !err.is_abort() {
                            comm.abort(err.exit_code()).await;
                        }
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

    fn stores(size: usize) -> Vec<MemoryStore> {
        (0..size).map(|_| MemoryStore::new()).collect()
    }

    #[tokio::test]
    async fn test_uneven_last_chunk() {
        let contents: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        let stores = stores(3);
        let results = run(3, Rank(1), contents.clone(), 120, stores.clone()).await;

        for result in &results {
            let plan = result.as_ref().unwrap();
            assert_eq!(plan.chunk_count(), 3);
            assert_eq!(plan.last_chunk_len(), 60);
        }
        for store in &stores {
            assert_eq!(store.contents(Path::new("f")).unwrap(), contents);
        }
    }

    #[tokio::test]
    async fn test_empty_file_creates_destinations() {
        let stores = stores(2);
        let results = run(2, Rank(0), Vec::new(), 16, stores.clone()).await;

        assert!(results.iter().all(|r| r.as_ref().unwrap().is_empty()));
        assert_eq!(stores[1].contents(Path::new("f")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_aborts_group() {
        let stores = stores(3);
        stores[2].fail_writes_after(1);
        let results = run(3, Rank(0), vec![7u8; 64], 8, stores).await;

        assert!(matches!(results[2], Err(Fatal::Io(_))));
        for result in &results[..2] {
            assert!(matches!(
                result,
                Err(Fatal::Comm(CommError::Aborted { by: Rank(2), .. }))
            ));
        }
    }
}
