//! Human-readable byte sizes.
//!
//! Chunk sizes are given as `<digits><unit>` where the unit is one of
//! `k`, `m`, `g` (binary multiples), optionally followed by `i`, `b` or
//! `ib`. Matching is case-insensitive, so `4m`, `4MB`, `4MiB` and `4mi`
//! all mean 4 MiB. A bare number is a byte count.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

static SIZE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([0-9]+)(([kmg])i?b?)?$").expect("Invalid size regex")
});

pub const KIB: u64 = 1 << 10;
pub const MIB: u64 = 1 << 20;
pub const GIB: u64 = 1 << 30;

/// Parse a size expression into a byte count.
///
/// ```
/// use filecast_core::parse_byte_size;
///
/// assert_eq!(parse_byte_size("4m").unwrap(), 4 * 1024 * 1024);
/// assert_eq!(parse_byte_size("1GiB").unwrap(), 1024 * 1024 * 1024);
/// assert_eq!(parse_byte_size("512").unwrap(), 512);
/// assert!(parse_byte_size("abc").is_err());
/// ```
pub fn parse_byte_size(input: &str) -> Result<u64, ConfigError> {
    let caps = SIZE_REGEX
        .captures(input)
        .ok_or_else(|| ConfigError::InvalidChunkSize(input.to_string()))?;

    let digits: u64 = caps[1]
        .parse()
        .map_err(|_| ConfigError::ChunkSizeOverflow(input.to_string()))?;

    let multiplier = match caps.get(3).map(|m| m.as_str().to_ascii_lowercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "k" => KIB,
            "m" => MIB,
            "g" => GIB,
            _ => return Err(ConfigError::InvalidChunkSize(input.to_string())),
        },
    };

    digits
        .checked_mul(multiplier)
        .ok_or_else(|| ConfigError::ChunkSizeOverflow(input.to_string()))
}

/// A byte count, parsed from either a number or a size expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// The number of bytes.
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl FromStr for ByteSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_byte_size(s).map(Self)
    }
}

impl From<u64> for ByteSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl TryFrom<i64> for ByteSize {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(Self)
            .map_err(|_| ConfigError::NegativeChunkSize(value))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        if b >= GIB && b % GIB == 0 {
            write!(f, "{}GiB", b / GIB)
        } else if b >= MIB && b % MIB == 0 {
            write!(f, "{}MiB", b / MIB)
        } else if b >= KIB && b % KIB == 0 {
            write!(f, "{}KiB", b / KIB)
        } else {
            write!(f, "{}B", b)
        }
    }
}
