//! Strong type definitions for filecast.
//!
//! Ranks are newtypes so a rank can never be confused with a byte count
//! or a chunk index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A member's position within its group, in `[0, size)`.
///
/// Ranks are assigned by the communication substrate and never change
/// for the lifetime of a run.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Rank(pub usize);

impl Rank {
    /// The rank that collects digests and prints group-wide diagnostics.
    pub const COORDINATOR: Self = Self(0);

    /// Create a rank from its index.
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The rank as an index into a gathered vector.
    pub const fn index(self) -> usize {
        self.0
    }

    /// Check whether this rank is valid for a group of `size` members.
    pub const fn is_within(self, size: usize) -> bool {
        self.0 < size
    }

    /// Iterate over every rank of a group of `size` members, in order.
    pub fn all(size: usize) -> impl Iterator<Item = Rank> {
        (0..size).map(Rank)
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.0)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for Rank {
    fn from(index: usize) -> Self {
        Self(index)
    }
}
