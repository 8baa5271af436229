//! Root election.
//!
//! Electing a root is split into three steps so that every member reaches
//! the same answer without a second round of agreement:
//!
//! 1. Each member turns its locally observable facts into an
//!    [`ElectionReport`] (file present? how large? does the digest match?
//!    is this the requested host?).
//! 2. The reports are all-gathered, so every member holds the same vector,
//!    indexed by rank.
//! 3. [`ElectionStrategy::reduce`] is a pure function of that vector.
//!
//! Step 2 is a single collective call regardless of strategy, and step 3
//! never communicates, so no strategy can skip or add a collective call on
//! some members.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::digest::FileDigest;
use crate::error::{ConfigError, ElectionError};
use crate::types::Rank;

/// How the group decides which member holds the authoritative file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionStrategy {
    /// The given rank is the root; it must have the file.
    ByRank(Rank),
    /// The member with the largest file; the lowest rank wins ties.
    ByLargestSize,
    /// The lowest rank whose file digest starts with the given hex prefix.
    ByChecksumPrefix(String),
    /// The single member running on the given host.
    ByHostname(String),
    /// The single member that has the file at all.
    ByAuto,
}

/// What one member contributes to the election all-gather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionReport {
    /// Whether the file exists locally.
    Presence(bool),
    /// Local file size, `None` when the file is absent or unreadable.
    Size(Option<u64>),
    /// Whether the local criterion (digest prefix, hostname) matched.
    Match(bool),
}

impl ElectionStrategy {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ElectionStrategy::ByRank(_) => "rank",
            ElectionStrategy::ByLargestSize => "size",
            ElectionStrategy::ByChecksumPrefix(_) => "checksum-prefix",
            ElectionStrategy::ByHostname(_) => "hostname",
            ElectionStrategy::ByAuto => "auto",
        }
    }

    /// Check the strategy against the group before any collective call.
    pub fn validate(&self, group_size: usize) -> Result<(), ConfigError> {
        match self {
            ElectionStrategy::ByRank(rank) if !rank.is_within(group_size) => {
                Err(ConfigError::RankOutOfRange {
                    rank: *rank,
                    size: group_size,
                })
            }
            ElectionStrategy::ByChecksumPrefix(prefix) if prefix.is_empty() => {
                Err(ConfigError::EmptyChecksumPrefix)
            }
            ElectionStrategy::ByChecksumPrefix(prefix)
                if !prefix.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                Err(ConfigError::InvalidChecksumPrefix(prefix.clone()))
            }
            ElectionStrategy::ByHostname(host) if host.is_empty() => {
                Err(ConfigError::EmptyHostname)
            }
            _ => Ok(()),
        }
    }

    /// Build this member's report from its local facts.
    ///
    /// Only the facts the strategy needs are consulted; `digest` is only
    /// read for [`ElectionStrategy::ByChecksumPrefix`]. A member without the
    /// file contributes a non-matching report, never an error.
    pub fn observe(&self, facts: &LocalFacts<'_>) -> ElectionReport {
        match self {
            ElectionStrategy::ByRank(_) | ElectionStrategy::ByAuto => {
                ElectionReport::Presence(facts.size.is_some())
            }
            ElectionStrategy::ByLargestSize => ElectionReport::Size(facts.size),
            ElectionStrategy::ByChecksumPrefix(prefix) => {
                ElectionReport::Match(facts.digest.is_some_and(|d| d.has_prefix(prefix)))
            }
            ElectionStrategy::ByHostname(host) => {
                ElectionReport::Match(facts.hostname == host.as_str())
            }
        }
    }

    /// Whether [`observe`](Self::observe) needs the local file digest.
    pub fn needs_digest(&self) -> bool {
        matches!(self, ElectionStrategy::ByChecksumPrefix(_))
    }

    /// Reduce the gathered reports, indexed by rank, to the root.
    ///
    /// Deterministic and order-independent with respect to how the vector
    /// was produced: every member holding the same vector gets the same
    /// result, including the same error.
    pub fn reduce(&self, reports: &[ElectionReport]) -> Result<Rank, ElectionError> {
        match self {
            ElectionStrategy::ByRank(root) => {
                let report = reports
                    .get(root.index())
                    .ok_or(ElectionError::MissingReport(*root))?;
                match report {
                    ElectionReport::Presence(true) => Ok(*root),
                    ElectionReport::Presence(false) => {
                        Err(ElectionError::RootLacksFile { root: *root })
                    }
                    _ => Err(ElectionError::UnexpectedReport(*root)),
                }
            }
            ElectionStrategy::ByLargestSize => {
                let sizes = collect(reports, |r| match r {
                    ElectionReport::Size(size) => Some(*size),
                    _ => None,
                })?;
                largest(&sizes).ok_or(ElectionError::NoSource)
            }
            ElectionStrategy::ByChecksumPrefix(prefix) => {
                let matches = collect(reports, as_match)?;
                matches
                    .iter()
                    .position(|m| *m)
                    .map(Rank::new)
                    .ok_or_else(|| ElectionError::NoChecksumMatch {
                        prefix: prefix.clone(),
                    })
            }
            ElectionStrategy::ByHostname(host) => {
                let matches = collect(reports, as_match)?;
                match ranks_where(&matches).as_slice() {
                    [] => Err(ElectionError::NoSuchHost(host.clone())),
                    [only] => Ok(*only),
                    many => Err(ElectionError::AmbiguousHost {
                        host: host.clone(),
                        ranks: many.to_vec(),
                    }),
                }
            }
            ElectionStrategy::ByAuto => {
                let present = collect(reports, |r| match r {
                    ElectionReport::Presence(p) => Some(*p),
                    _ => None,
                })?;
                match ranks_where(&present).as_slice() {
                    [] => Err(ElectionError::NoSource),
                    [only] => Ok(*only),
                    many => Err(ElectionError::MultipleSources {
                        ranks: many.to_vec(),
                    }),
                }
            }
        }
    }
}

impl fmt::Display for ElectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElectionStrategy::ByRank(rank) => write!(f, "rank {}", rank),
            ElectionStrategy::ByLargestSize => write!(f, "largest size"),
            ElectionStrategy::ByChecksumPrefix(p) => write!(f, "checksum prefix '{}'", p),
            ElectionStrategy::ByHostname(h) => write!(f, "hostname '{}'", h),
            ElectionStrategy::ByAuto => write!(f, "auto"),
        }
    }
}

/// Locally observable facts a member feeds into [`ElectionStrategy::observe`].
#[derive(Debug, Clone, Copy)]
pub struct LocalFacts<'a> {
    /// Size of the local file, `None` when absent.
    pub size: Option<u64>,
    /// Digest of the local file as it exists before the transfer.
    pub digest: Option<&'a FileDigest>,
    /// This member's hostname.
    pub hostname: &'a str,
}

/// The strategy selectors given on the command line, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategySelectors {
    pub rank: Option<usize>,
    pub largest_size: bool,
    pub checksum_prefix: Option<String>,
    pub hostname: Option<String>,
    pub auto: bool,
}

impl StrategySelectors {
    /// Names of the selectors that were given.
    pub fn selected(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.auto {
            names.push("--auto");
        }
        if self.largest_size {
            names.push("--size");
        }
        if self.checksum_prefix.is_some() {
            names.push("--checksum-prefix");
        }
        if self.rank.is_some() {
            names.push("--rank");
        }
        if self.hostname.is_some() {
            names.push("--hostname");
        }
        names
    }

    /// Resolve to exactly one strategy.
    pub fn resolve(self) -> Result<ElectionStrategy, ConfigError> {
        let selected = self.selected();
        if selected.len() > 1 {
            return Err(ConfigError::ConflictingStrategies(selected));
        }

        if let Some(rank) = self.rank {
            Ok(ElectionStrategy::ByRank(Rank::new(rank)))
        } else if self.largest_size {
            Ok(ElectionStrategy::ByLargestSize)
        } else if let Some(prefix) = self.checksum_prefix {
            Ok(ElectionStrategy::ByChecksumPrefix(prefix))
        } else if let Some(host) = self.hostname {
            Ok(ElectionStrategy::ByHostname(host))
        } else if self.auto {
            Ok(ElectionStrategy::ByAuto)
        } else {
            Err(ConfigError::MissingStrategy)
        }
    }
}

fn as_match(report: &ElectionReport) -> Option<bool> {
    match report {
        ElectionReport::Match(m) => Some(*m),
        _ => None,
    }
}

/// Project every report, failing on the first one of the wrong shape.
fn collect<T>(
    reports: &[ElectionReport],
    project: impl Fn(&ElectionReport) -> Option<T>,
) -> Result<Vec<T>, ElectionError> {
    reports
        .iter()
        .enumerate()
        .map(|(i, r)| project(r).ok_or(ElectionError::UnexpectedReport(Rank::new(i))))
        .collect()
}

fn ranks_where(flags: &[bool]) -> Vec<Rank> {
    flags
        .iter()
        .enumerate()
        .filter(|(_, f)| **f)
        .map(|(i, _)| Rank::new(i))
        .collect()
}

/// First index of the maximum size; absent sizes never win.
fn largest(sizes: &[Option<u64>]) -> Option<Rank> {
    let mut best: Option<(usize, u64)> = None;
    for (i, size) in sizes.iter().enumerate() {
        if let Some(size) = *size {
            if best.map_or(true, |(_, b)| size > b) {
                best = Some((i, size));
            }
        }
    }
    best.map(|(i, _)| Rank::new(i))
}
