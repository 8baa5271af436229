//! Communicator abstraction for collective operations.
//!
//! The communicator is the group communication substrate: a fixed group of
//! members, each with a stable rank, and a handful of collective
//! primitives. Implementations may sit on MPI, a job launcher's own
//! channels, or (for tests and the local launcher) in-process channels.
//!
//! Every primitive here is a synchronization point. All members must issue
//! the same collectives, with the same shapes, in the same order.

use std::future::Future;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use filecast_core::Rank;

use crate::codec;
use crate::error::Result;

/// The kind of a collective call, used to detect desynchronized members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collective {
    Broadcast,
    AllGather,
    Gather,
    Barrier,
}

/// Collective primitives over a fixed group.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Communicator: Send + Sync {
    /// This member's rank.
    fn rank(&self) -> Rank;

    /// Number of members in the group.
    fn size(&self) -> usize;

    /// Replace `buf` on every member with the contents of `buf` on `root`.
    ///
    /// The length of `buf` must be agreed out of band; it is identical on
    /// every caller of a given broadcast.
    async fn broadcast(&self, buf: &mut [u8], root: Rank) -> Result<()>;

    /// Collect one value from every member on every member, indexed by rank.
    async fn all_gather(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>>;

    /// Collect one value from every member on `dest`, indexed by rank.
    ///
    /// Returns `None` on every member other than `dest`.
    async fn gather(&self, local: Vec<u8>, dest: Rank) -> Result<Option<Vec<Vec<u8>>>>;

    /// Block until every member has reached the barrier.
    async fn barrier(&self) -> Result<()>;

    /// Terminate every member of the group with `code`.
    ///
    /// Terminal. Substrates backed by a process launcher never return from
    /// this call; the in-process group returns so the caller can unwind,
    /// and any collective that would otherwise wait fails with
    /// [`CommError::Aborted`](crate::CommError::Aborted).
    async fn abort(&self, code: i32);

    /// Whether this member is `root`.
    fn is_rank(&self, root: Rank) -> bool {
        self.rank() == root
    }
}

/// Typed helpers on top of the raw byte collectives.
pub trait CommunicatorExt: Communicator {
    /// All-gather a serializable value.
    fn all_gather_value<T>(&self, value: &T) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: Serialize + DeserializeOwned + Send + Sync;

    /// Gather a serializable value to `dest`.
    fn gather_value<T>(
        &self,
        value: &T,
        dest: Rank,
    ) -> impl Future<Output = Result<Option<Vec<T>>>> + Send
    where
        T: Serialize + DeserializeOwned + Send + Sync;

    /// Broadcast a `u64` from `root` as a fixed 8-byte little-endian buffer.
    fn broadcast_u64(&self, value: u64, root: Rank) -> impl Future<Output = Result<u64>> + Send;
}

impl<C: Communicator + ?Sized> CommunicatorExt for C {
    async fn all_gather_value<T>(&self, value: &T) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        let gathered = self.all_gather(codec::encode(value)?).await?;
        codec::decode_all(&gathered)
    }

    async fn gather_value<T>(&self, value: &T, dest: Rank) -> Result<Option<Vec<T>>>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
    {
        match self.gather(codec::encode(value)?, dest).await? {
            Some(gathered) => codec::decode_all(&gathered).map(Some),
            None => Ok(None),
        }
    }

    async fn broadcast_u64(&self, value: u64, root: Rank) -> Result<u64> {
        let mut buf = value.to_le_bytes();
        self.broadcast(&mut buf, root).await?;
        Ok(u64::from_le_bytes(buf))
    }
}
