//! Configuration for a filecast run.
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Per-rank path templating

use std::num::NonZeroU64;
use std::path::{Path, PathBuf};

use clap::Parser;
use filecast_core::{
    parse_byte_size, ConfigError, ElectionStrategy, Rank, StrategySelectors, GIB,
};

/// Default chunk size: one GiB.
pub const DEFAULT_CHUNK_SIZE: u64 = GIB;

/// Placeholder replaced with the member's rank in the file path.
pub const RANK_PLACEHOLDER: &str = "{rank}";

/// Members spawned by the local launcher unless told otherwise.
const DEFAULT_LOCAL_GROUP_SIZE: usize = 2;

/// Distribute one file from a single rank to every rank of a group
#[derive(Parser, Debug, Clone)]
#[command(
    name = "filecast",
    version,
    about = "Distribute one file to every member of a process group",
    long_about = "Elects the member that holds the file, broadcasts it to every other member \
                  in fixed-size chunks, then compares checksums across the group.\n\n\
                  This binary runs the group in-process, one member per rank, each with its \
                  own copy of the path (use {rank} in the path to give members distinct files).",
    after_help = "EXAMPLES:\n    \
        filecast 'data/{rank}/model.bin' --rank 0\n    \
        filecast 'data/{rank}/model.bin' --np 4 --size -c 64m\n    \
        filecast 'data/{rank}/model.bin' --checksum-prefix 3fa9 -f\n\n\
        EXIT STATUS:\n    \
        0  success\n    \
        1  failure\n    \
        2  destination exists (use --force-overwrite)"
)]
pub struct CliArgs {
    /// File to distribute; `{rank}` is replaced with each member's rank
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Use the given rank as the root
    #[arg(long, value_name = "N")]
    pub rank: Option<usize>,

    /// Use the rank with the largest file as the root
    #[arg(long)]
    pub size: bool,

    /// Use the lowest rank whose BLAKE3 checksum (as printed by `b3sum`)
    /// starts with this hex prefix
    #[arg(long, value_name = "PREFIX")]
    pub checksum_prefix: Option<String>,

    /// Use the rank running on this host as the root
    #[arg(long, value_name = "HOST")]
    pub hostname: Option<String>,

    /// Use the only rank that has the file as the root (default)
    #[arg(long)]
    pub auto: bool,

    /// Overwrite destination files that already exist
    #[arg(short = 'f', long)]
    pub force_overwrite: bool,

    /// Chunk size, e.g. 512, 4m, 1GiB
    #[arg(short = 'c', long, default_value = "1GB", value_name = "SIZE")]
    pub chunk_size: String,

    /// Skip the checksum comparison after the transfer
    #[arg(long)]
    pub no_checksum: bool,

    /// Use the path verbatim instead of substituting {rank}
    #[arg(long)]
    pub no_format_filename: bool,

    /// Number of members in the local group
    #[arg(long, default_value_t = DEFAULT_LOCAL_GROUP_SIZE, value_name = "N")]
    pub np: usize,

    /// Verbose output (log every chunk)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl CliArgs {
    /// The strategy selectors given on the command line.
    ///
    /// With no selector at all the group falls back to `--auto`.
    pub fn selectors(&self) -> StrategySelectors {
        let selectors = StrategySelectors {
            rank: self.rank,
            largest_size: self.size,
            checksum_prefix: self.checksum_prefix.clone(),
            hostname: self.hostname.clone(),
            auto: self.auto,
        };
        if selectors.selected().is_empty() {
            StrategySelectors {
                auto: true,
                ..selectors
            }
        } else {
            selectors
        }
    }
}

/// Whether an existing destination file may be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    #[default]
    Refuse,
    Allow,
}

/// Configuration for one run, identical on every member.
#[derive(Debug, Clone)]
pub struct CastConfig {
    /// File path, possibly containing [`RANK_PLACEHOLDER`].
    pub path: PathBuf,
    /// How the root is elected.
    pub strategy: ElectionStrategy,
    /// Chunk size in bytes.
    pub chunk_size: u64,
    /// Whether existing destinations may be replaced.
    pub overwrite: OverwritePolicy,
    /// Whether to compare digests after the transfer.
    pub verify_checksum: bool,
    /// Whether to substitute the rank into the path.
    pub format_filename: bool,
}

impl CastConfig {
    /// A configuration with default chunk size, no overwrite, and verification on.
    pub fn new(path: impl Into<PathBuf>, strategy: ElectionStrategy) -> Self {
        Self {
            path: path.into(),
            strategy,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite: OverwritePolicy::Refuse,
            verify_checksum: true,
            format_filename: true,
        }
    }

    /// Create and validate the per-run configuration from CLI arguments.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let strategy = args.selectors().resolve()?;
        let chunk_size = parse_byte_size(&args.chunk_size)?;

        Ok(Self {
            path: args.path.clone(),
            strategy,
            chunk_size,
            overwrite: if args.force_overwrite {
                OverwritePolicy::Allow
            } else {
                OverwritePolicy::Refuse
            },
            verify_checksum: !args.no_checksum,
            format_filename: !args.no_format_filename,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn with_format_filename(mut self, format: bool) -> Self {
        self.format_filename = format;
        self
    }

    /// Check everything that can be checked without talking to the group.
    ///
    /// Every member sees the same arguments and group size, so every member
    /// reaches the same verdict. Returns the chunk size on success.
    pub fn validate(&self, group_size: usize) -> Result<NonZeroU64, ConfigError> {
        if group_size < 2 {
            return Err(ConfigError::GroupTooSmall(group_size));
        }

        self.strategy.validate(group_size)?;

        let chunk_size = NonZeroU64::new(self.chunk_size).ok_or(ConfigError::ZeroChunkSize)?;
        if usize::try_from(self.chunk_size).is_err() {
            return Err(ConfigError::ChunkSizeTooLarge(self.chunk_size));
        }

        Ok(chunk_size)
    }

    /// The path this member reads or writes.
    pub fn local_path(&self, rank: Rank) -> PathBuf {
        if !self.format_filename {
            return self.path.clone();
        }
        format_path(&self.path, rank)
    }

    /// Whether the path renders differently for different ranks.
    pub fn is_rank_specific(&self) -> bool {
        self.format_filename && self.local_path(Rank(0)) != self.local_path(Rank(1))
    }
}

fn format_path(path: &Path, rank: Rank) -> PathBuf {
    match path.to_str() {
        Some(template) => PathBuf::from(template.replace(RANK_PLACEHOLDER, &rank.to_string())),
        None => path.to_path_buf(),
    }
}
