//! An in-process group for tests and the local launcher.
//!
//! Every ordered pair of members is connected by a bounded channel, so
//! messages between two members arrive in the order they were sent, just
//! like point-to-point traffic under a real collective library. Each
//! message carries the sender's collective sequence number and kind, which
//! turns a desynchronized call sequence into an error instead of a hang.
//!
//! Aborting is modelled with a shared watch channel: once any member
//! aborts, every collective that would otherwise wait fails with
//! [`CommError::Aborted`]. Messages that were already delivered are still
//! received, so a verdict sent just before an abort is not lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, watch, Mutex};

use filecast_core::Rank;

use crate::communicator::{Collective, Communicator};
use crate::error::{CommError, Result};

/// Messages buffered per ordered pair of members.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Builder for an in-process group.
pub struct MemoryGroup;

impl MemoryGroup {
    /// Create a group of `size` connected members, ordered by rank.
    pub fn new(size: usize) -> Vec<MemoryCommunicator> {
        Self::with_capacity(size, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a group whose pairwise channels buffer `capacity` messages.
    pub fn with_capacity(size: usize, capacity: usize) -> Vec<MemoryCommunicator> {
        let capacity = capacity.max(1);
        let abort = Arc::new(watch::Sender::new(None));

        // senders[src][dst] and receivers[dst][src]
        let mut senders: Vec<Vec<Option<mpsc::Sender<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<mpsc::Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            for dst in 0..size {
                if src != dst {
                    let (tx, rx) = mpsc::channel(capacity);
                    senders[src][dst] = Some(tx);
                    receivers[dst][src] = Some(rx);
                }
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (outboxes, inboxes))| MemoryCommunicator {
                rank: Rank::new(rank),
                size,
                outboxes,
                inboxes: inboxes.into_iter().map(|rx| rx.map(Mutex::new)).collect(),
                seq: AtomicU64::new(0),
                abort: Arc::clone(&abort),
            })
            .collect()
    }
}

#[derive(Debug)]
struct Envelope {
    seq: u64,
    kind: Collective,
    payload: Bytes,
}

/// Who aborted the group, and with which exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortSignal {
    pub by: Rank,
    pub code: i32,
}

impl From<AbortSignal> for CommError {
    fn from(signal: AbortSignal) -> Self {
        CommError::Aborted {
            by: signal.by,
            code: signal.code,
        }
    }
}

/// One member of an in-process group.
pub struct MemoryCommunicator {
    rank: Rank,
    size: usize,
    /// Channel into each peer's inbox; `None` at this member's own index.
    outboxes: Vec<Option<mpsc::Sender<Envelope>>>,
    /// Channel from each peer; `None` at this member's own index.
    inboxes: Vec<Option<Mutex<mpsc::Receiver<Envelope>>>>,
    /// Number of collectives issued so far.
    seq: AtomicU64,
    abort: Arc<watch::Sender<Option<AbortSignal>>>,
}

impl MemoryCommunicator {
    /// The abort that terminated the group, if any.
    pub fn abort_signal(&self) -> Option<AbortSignal> {
        *self.abort.borrow()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank.is_within(self.size) {
            Ok(())
        } else {
            Err(CommError::InvalidRank {
                rank,
                size: self.size,
            })
        }
    }

    fn peers(&self) -> impl Iterator<Item = Rank> + '_ {
        Rank::all(self.size).filter(move |r| *r != self.rank)
    }

    /// Error for a closed channel: the abort if there was one.
    fn lost(&self, peer: Rank) -> CommError {
        match self.abort_signal() {
            Some(signal) => signal.into(),
            None => CommError::Disconnected(peer),
        }
    }

    async fn send(&self, dst: Rank, seq: u64, kind: Collective, payload: Bytes) -> Result<()> {
        let tx = self.outboxes[dst.index()]
            .as_ref()
            .ok_or(CommError::InvalidRank {
                rank: dst,
                size: self.size,
            })?;
        let mut abort_rx = self.abort.subscribe();
        let envelope = Envelope { seq, kind, payload };

        tokio::select! {
            biased;
            sent = tx.send(envelope) => sent.map_err(|_| self.lost(dst)),
            signal = wait_for_abort(&mut abort_rx) => Err(signal.into()),
        }
    }

    async fn recv(&self, src: Rank, seq: u64, kind: Collective) -> Result<Bytes> {
        let inbox = self.inboxes[src.index()]
            .as_ref()
            .ok_or(CommError::InvalidRank {
                rank: src,
                size: self.size,
            })?;
        let mut abort_rx = self.abort.subscribe();
        let mut rx = inbox.lock().await;

        let envelope = tokio::select! {
            biased;
            envelope = rx.recv() => envelope.ok_or_else(|| self.lost(src))?,
            signal = wait_for_abort(&mut abort_rx) => return Err(signal.into()),
        };

        if envelope.seq != seq || envelope.kind != kind {
            return Err(CommError::Desynchronized {
                seq,
                peer: src,
                local: kind,
                remote: envelope.kind,
            });
        }
        Ok(envelope.payload)
    }

    /// Every member sends `local` to every other member.
    async fn exchange(&self, kind: Collective, local: Bytes) -> Result<Vec<Bytes>> {
        let seq = self.next_seq();

        for dst in self.peers() {
            self.send(dst, seq, kind, local.clone()).await?;
        }

        let mut gathered = Vec::with_capacity(self.size);
        for src in Rank::all(self.size) {
            if src == self.rank {
                gathered.push(local.clone());
            } else {
                gathered.push(self.recv(src, seq, kind).await?);
            }
        }
        Ok(gathered)
    }
}

async fn wait_for_abort(rx: &mut watch::Receiver<Option<AbortSignal>>) -> AbortSignal {
    loop {
        let current = *rx.borrow_and_update();
        if let Some(signal) = current {
            return signal;
        }
        if rx.changed().await.is_err() {
            // Every communicator holds the sender, so this only happens
            // while the group is being torn down.
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Communicator for MemoryCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn broadcast(&self, buf: &mut [u8], root: Rank) -> Result<()> {
        self.check_rank(root)?;
        let seq = self.next_seq();

        if self.rank == root {
            let payload = Bytes::copy_from_slice(buf);
            for dst in self.peers() {
                self.send(dst, seq, Collective::Broadcast, payload.clone())
                    .await?;
            }
        } else {
            let payload = self.recv(root, seq, Collective::Broadcast).await?;
            if payload.len() != buf.len() {
                return Err(CommError::LengthMismatch {
                    root,
                    local: buf.len(),
                    remote: payload.len(),
                });
            }
            buf.copy_from_slice(&payload);
        }
        Ok(())
    }

    async fn all_gather(&self, local: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        let gathered = self
            .exchange(Collective::AllGather, Bytes::from(local))
            .await?;
        Ok(gathered.into_iter().map(|b| b.to_vec()).collect())
    }

    async fn gather(&self, local: Vec<u8>, dest: Rank) -> Result<Option<Vec<Vec<u8>>>> {
        self.check_rank(dest)?;
        let seq = self.next_seq();

        if self.rank != dest {
            self.send(dest, seq, Collective::Gather, Bytes::from(local))
                .await?;
            return Ok(None);
        }

        let mut local = Some(local);
        let mut gathered = Vec::with_capacity(self.size);
        for src in Rank::all(self.size) {
            if src == self.rank {
                gathered.push(local.take().unwrap_or_default());
            } else {
                gathered.push(self.recv(src, seq, Collective::Gather).await?.to_vec());
            }
        }
        Ok(Some(gathered))
    }

    async fn barrier(&self) -> Result<()> {
        self.exchange(Collective::Barrier, Bytes::new()).await?;
        Ok(())
    }

    async fn abort(&self, code: i32) {
        let rank = self.rank;
        let first = self.abort.send_if_modified(|state| {
            if state.is_none() {
                *state = Some(AbortSignal { by: rank, code });
                true
            } else {
                false
            }
        });
        if first {
            tracing::warn!(rank = %rank, code, "group aborted");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use crate::communicator::CommunicatorExt;

    /// Run `f` on every member concurrently and collect the results by rank.
    async fn run_group<F, Fut, T>(size: usize, f: F) -> Vec<T>
    where
        F: Fn(MemoryCommunicator) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = MemoryGroup::new(size)
            .into_iter()
            .map(|comm| tokio::spawn(f(comm)))
            .collect();

        let mut results = Vec::with_capacity(size);
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test]
    async fn test_broadcast_from_non_zero_root() {
        let results = run_group(3, |comm| async move {
            let mut buf = if comm.rank() == Rank(1) {
                *b"payload!"
            } else {
                [0u8; 8]
            };
            comm.broadcast(&mut buf, Rank(1)).await.unwrap();
            buf
        })
        .await;

        for buf in results {
            assert_eq!(&buf, b"payload!");
        }
    }

    #[tokio::test]
    async fn test_all_gather_is_rank_ordered() {
        let results = run_group(4, |comm| async move {
            let value = comm.rank().index() as u64 * 10;
            comm.all_gather_value(&value).await.unwrap()
        })
        .await;

        for gathered in results {
            assert_eq!(gathered, vec![0, 10, 20, 30]);
        }
    }

    #[tokio::test]
    async fn test_gather_only_at_destination() {
        let results = run_group(3, |comm| async move {
            let value = format!("from {}", comm.rank());
            comm.gather_value(&value, Rank(2)).await.unwrap()
        })
        .await;

        assert_eq!(results[0], None);
        assert_eq!(results[1], None);
        assert_eq!(
            results[2],
            Some(vec![
                "from 0".to_string(),
                "from 1".to_string(),
                "from 2".to_string()
            ])
        );
    }

    #[tokio::test]
    async fn test_broadcast_u64() {
        let results = run_group(2, |comm| async move {
            let value = if comm.rank() == Rank(0) { u64::MAX - 7 } else { 0 };
            comm.broadcast_u64(value, Rank(0)).await.unwrap()
        })
        .await;
        assert_eq!(results, vec![u64::MAX - 7, u64::MAX - 7]);
    }

    #[tokio::test]
    async fn test_many_collectives_in_sequence() {
        let results = run_group(3, |comm| async move {
            for round in 0..50u64 {
                let mut buf = round.to_le_bytes();
                comm.broadcast(&mut buf, Rank((round % 3) as usize))
                    .await
                    .unwrap();
                comm.barrier().await.unwrap();
            }
            comm.all_gather_value(&comm.rank()).await.unwrap()
        })
        .await;

        for gathered in results {
            assert_eq!(gathered, vec![Rank(0), Rank(1), Rank(2)]);
        }
    }

    #[tokio::test]
    async fn test_length_mismatch() {
        let results = run_group(2, |comm| async move {
            let mut buf = vec![0u8; if comm.rank() == Rank(0) { 4 } else { 5 }];
            comm.broadcast(&mut buf, Rank(0)).await
        })
        .await;

        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(CommError::LengthMismatch {
                local: 5,
                remote: 4,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_desynchronized_calls_are_detected() {
        let results = run_group(2, |comm| async move {
            if comm.rank() == Rank(0) {
                comm.barrier().await
            } else {
                comm.all_gather(vec![1]).await.map(|_| ())
            }
        })
        .await;

        for result in results {
            assert!(matches!(result, Err(CommError::Desynchronized { .. })));
        }
    }

    #[tokio::test]
    async fn test_abort_wakes_blocked_members() {
        let results = run_group(3, |comm| async move {
            if comm.rank() == Rank(0) {
                comm.abort(3).await;
                Err(CommError::Aborted {
                    by: Rank(0),
                    code: 3,
                })
            } else {
                let mut buf = [0u8; 8];
                comm.broadcast(&mut buf, Rank(0)).await
            }
        })
        .await;

        for result in results {
            assert!(matches!(
                result,
                Err(CommError::Aborted { by: Rank(0), code: 3 })
            ));
        }
    }

    #[tokio::test]
    async fn test_first_abort_wins() {
        let group = MemoryGroup::new(2);
        group[1].abort(2).await;
        group[0].abort(1).await;
        assert_eq!(
            group[0].abort_signal(),
            Some(AbortSignal {
                by: Rank(1),
                code: 2
            })
        );
        assert!(matches!(
            group[0].barrier().await,
            Err(CommError::Aborted { by: Rank(1), code: 2 })
        ));
    }

    #[tokio::test]
    async fn test_invalid_root() {
        let group = MemoryGroup::new(2);
        let mut buf = [0u8; 1];
        assert!(matches!(
            group[0].broadcast(&mut buf, Rank(5)).await,
            Err(CommError::InvalidRank { .. })
        ));
        assert!(matches!(
            group[0].gather(vec![], Rank(2)).await,
            Err(CommError::InvalidRank { .. })
        ));
    }

    #[test]
    fn test_members_know_their_rank() {
        let group = MemoryGroup::new(3);
        for (index, member) in group.iter().enumerate() {
            assert_eq!(member.rank(), Rank(index));
            assert_eq!(member.size(), 3);
            assert!(member.is_rank(Rank(index)));
            assert!(!member.is_rank(Rank((index + 1) % 3)));
        }
    }
}
