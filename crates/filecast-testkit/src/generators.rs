//! Proptest generators for property-based testing.

use proptest::prelude::*;

use filecast_core::{GIB, KIB, MIB};

/// Generate file contents of at most `max_len` bytes, empty included.
pub fn file_contents(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a non-zero chunk size of at most `max` bytes.
pub fn chunk_size(max: u64) -> impl Strategy<Value = u64> {
    1u64..=max.max(1)
}

/// Generate a group size worth transferring to.
pub fn group_size() -> impl Strategy<Value = usize> {
    2usize..=6
}

/// Generate a size suffix and the multiplier it stands for.
pub fn size_suffix() -> impl Strategy<Value = (&'static str, u64)> {
    prop_oneof![
        Just(("", 1)),
        Just(("k", KIB)),
        Just(("K", KIB)),
        Just(("kb", KIB)),
        Just(("Ki", KIB)),
        Just(("KiB", KIB)),
        Just(("m", MIB)),
        Just(("MB", MIB)),
        Just(("mib", MIB)),
        Just(("g", GIB)),
        Just(("GB", GIB)),
        Just(("GiB", GIB)),
    ]
}

/// Generate a valid size expression with the byte count it denotes.
pub fn size_expression() -> impl Strategy<Value = (String, u64)> {
    (0u64..=4096, size_suffix())
        .prop_map(|(digits, (suffix, unit))| (format!("{digits}{suffix}"), digits * unit))
}
