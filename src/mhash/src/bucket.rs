//! Buckets, bucket addressing and hash-prefix arithmetic.
//!
//! A bucket at depth `d` is addressed by the first `d` bytes of the item
//! hash, big-endian:
//!
//! ```text
//! hash = 0xAB_CD_12_...
//!
//! depth 0   "root:"         consumes byte 0 (0xAB) to pick the branch
//! depth 1   "root:ab"       consumes byte 1 (0xCD)
//! depth 2   "root:abcd"     consumes byte 2 (0x12)
//! ...
//! ```
//!
//! The byte consumed at depth `d` to decide whether to go deeper is exactly
//! the byte appended to the prefix of the child bucket at depth `d + 1`.

use std::fmt;

use crate::bitset::BitSet;

/// Maximum number of bucket levels a lookup may descend.
pub const MAX_DEEP_LEVELS: usize = 5;

/// Keep only the top `depth` bytes of `hash`.
///
/// `depth` must be at most 8.
pub fn prefix_at_depth(hash: u64, depth: usize) -> u64 {
    debug_assert!(depth <= 8, "depth {} out of range", depth);
    let shift = 64 - 8 * depth as u32;
    hash & u64::MAX.checked_shl(shift).unwrap_or(0)
}

/// Hash byte right after the first `depth` bytes: the bitset offset checked
/// in a bucket at `depth`.
///
/// `depth` must be less than 8.
pub fn next_byte_offset(hash: u64, depth: usize) -> u8 {
    debug_assert!(depth < 8, "depth {} out of range", depth);
    hash.to_be_bytes()[depth]
}

/// Items materialized from one cache entry plus their branch bitmap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket<T> {
    /// Items stored directly in this bucket, in storage order.
    pub items: Vec<T>,
    /// Branches pushed into deeper buckets.
    pub bitset: BitSet,
}

impl<T> Bucket<T> {
    pub fn new(items: Vec<T>, bitset: BitSet) -> Self {
        Self { items, bitset }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.bitset.is_empty()
    }
}

impl<T> Default for Bucket<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            bitset: BitSet::default(),
        }
    }
}

/// Address of a bucket: root key, hash prefix and prefix length.
///
/// Its `Display` form is the cache key:
/// `{root_key}:{hex of the first hash_len bytes of hash}`.
///
/// Only [`at_depth`](BucketKey::at_depth) builds one, so `hash_len` is at
/// most 8 and the bytes of `hash` past `hash_len` are zero.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketKey<R> {
    root_key: R,
    hash: u64,
    hash_len: usize,
}

impl<R> BucketKey<R> {
    /// Address of the bucket at `depth` along the descent path of `key_hash`.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is greater than 8.
    pub fn at_depth(root_key: R, key_hash: u64, depth: usize) -> Self {
        assert!(depth <= 8, "bucket depth {} exceeds hash length", depth);
        Self {
            root_key,
            hash: prefix_at_depth(key_hash, depth),
            hash_len: depth,
        }
    }

    /// Address of the root bucket.
    pub fn root(root_key: R) -> Self {
        Self::at_depth(root_key, 0, 0)
    }

    pub fn root_key(&self) -> &R {
        &self.root_key
    }

    /// Hash prefix; only the top [`hash_len`](BucketKey::hash_len) bytes may
    /// be non-zero.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Number of hash bytes consumed to reach this bucket.
    pub fn hash_len(&self) -> usize {
        self.hash_len
    }
}

impl<R: fmt::Display> fmt::Display for BucketKey<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.hash.to_be_bytes();
        write!(
            f,
            "{}:{}",
            self.root_key,
            hex::encode(&data[..self.hash_len])
        )
    }
}
