//! Key capabilities required by the hash index.

use std::fmt;

/// Identifier of an item stored in the index.
///
/// Two keys that compare equal must return the same [`key_hash`](Key::key_hash),
/// and the hash must be stable across processes: it decides which bucket an
/// item lives in, and writers and readers may run in different processes.
pub trait Key: Eq + Clone + Send + Sync + 'static {
    /// 64-bit digest, expected to be uniformly distributed.
    fn key_hash(&self) -> u64;
}

/// Identifier of a whole index instance (for example one index per tenant).
///
/// Its `Display` rendering is used as the cache key namespace of every bucket
/// in the index, so it must be deterministic.
pub trait RootKey: fmt::Display + Clone + Send + Sync + 'static {}

impl<T> RootKey for T where T: fmt::Display + Clone + Send + Sync + 'static {}

/// Key digest of integer ids.
///
/// Sequential ids differ only in their low bits, while the index branches on
/// the high bytes first. This mixer spreads every input bit over the whole
/// digest so consecutive ids land in different root branches.
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

impl Key for u64 {
    fn key_hash(&self) -> u64 {
        splitmix64(*self)
    }
}
