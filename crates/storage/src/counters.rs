//! Persisted next-free-index counters.
//!
//! Each [`Namespace`] keeps its count under [`Namespace::count_key`]. The
//! count is the exclusive upper bound of the indices in use, so entries live
//! at `0..count`.

use crate::{KeyValueStore, Namespace, Result};

/// Parse a stored count the way a browser's `parseInt` would.
///
/// Leading whitespace is skipped and the leading run of ASCII digits is used.
/// Anything else, including negative numbers and overflow, reads as zero.
/// `u64::MAX` also reads as zero since it has no next index.
pub fn parse_count(raw: &str) -> u64 {
    let trimmed = raw.trim_start();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed, |end| &trimmed[..end]);
    digits
        .parse::<u64>()
        .ok()
        .filter(|count| *count < u64::MAX)
        .unwrap_or(0)
}

/// Current count for `ns`. Missing or corrupt values read as zero.
pub fn count<S: KeyValueStore + ?Sized>(store: &S, ns: Namespace) -> Result<u64> {
    Ok(store
        .get(ns.count_key())?
        .as_deref()
        .map(parse_count)
        .unwrap_or(0))
}

/// Bump the count for `ns`, returning the new value.
pub fn increment<S: KeyValueStore + ?Sized>(store: &mut S, ns: Namespace) -> Result<u64> {
    store.increment(ns.count_key())
}

/// Reset the count for `ns` to zero.
pub fn reset<S: KeyValueStore + ?Sized>(store: &mut S, ns: Namespace) -> Result<()> {
    store.set(ns.count_key(), "0")
}
