//! # Cache-Backed Extensible Hash Index
//!
//! This crate stores many application items under one root key in a remote
//! key-value cache whose entries have limited capacity, and looks them up
//! with as few cache round trips as possible.
//!
//! ## Overview
//!
//! A single cache entry cannot hold an unbounded number of items, so the
//! items of a root key are spread over *buckets*. A full bucket is split by
//! the write path: one branch (all items whose hash byte at that depth has a
//! given value) moves to a child bucket addressed by one more hash byte, and
//! the parent records the move in its 256-bit bitset.
//!
//! ```text
//!                     "tenant:"  (depth 0)
//!              bitset: {0x3f, 0x9c}   items: [...]
//!                 │                │
//!                 ▼                ▼
//!        "tenant:3f" (depth 1)   "tenant:9c" (depth 1)
//!        bitset: {0xa2}          bitset: {}
//!                 │
//!                 ▼
//!        "tenant:3fa2" (depth 2)
//! ```
//!
//! Lookups descend at most [`MAX_DEEP_LEVELS`] levels.
//!
//! ## Lookup Flow
//!
//! ```text
//! 1. Hash key -> 64-bit digest (computed once)
//! 2. Fetch bucket at depth d (d = 0 first), batched with other lookups
//! 3. Bitset bit for digest byte d set?  -> d += 1, back to 2
//! 4. Otherwise scan the bucket's items for an equal key -> found / absent
//! ```
//!
//! ## Batching
//!
//! [`Hash::get`] does not block. It queues a bucket fetch and a continuation
//! on a [`Session`] and returns a [`GetHandle`]. Resolving any handle drains
//! the session round by round: each round the [`Pipeline`] sends all queued
//! fetches in one multi-get, then runs the continuations, which queue the
//! next level's fetches. Lookups sharing a session therefore share round
//! trips, and identical bucket keys in one round are fetched once.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let pipeline = Pipeline::new(Arc::new(client), Session::new(), PipelineConfig::default());
//! let index: Hash<User, String, u64> =
//!     Hash::new(pipeline, |u: &User| u.id, user_unmarshaler, Arc::new(filler));
//!
//! let ctx = Context::new();
//! let handles: Vec<_> = ids
//!     .iter()
//!     .map(|&id| index.get(&ctx, "tenant-1".to_string(), id))
//!     .collect();
//! for handle in handles {
//!     match handle.resolve().await? {
//!         Some(user) => println!("found {}", user.name),
//!         None => println!("absent"),
//!     }
//! }
//! ```

mod bitset;
mod bucket;
mod client;
mod codec;
mod config;
mod context;
mod deferred;
mod error;
mod hash;
mod item;
mod key;
mod pipeline;
mod session;

pub use bitset::{BitSet, BIT_SET_BYTES};
pub use bucket::{next_byte_offset, prefix_at_depth, Bucket, BucketKey, MAX_DEEP_LEVELS};
pub use client::CacheClient;
pub use codec::{bucket_unmarshaler, Unmarshaler, Value, BUCKET_FORMAT_VERSION, BUCKET_HEADER_SIZE};
pub use config::PipelineConfig;
pub use context::Context;
pub use deferred::Deferred;
pub use error::{MhashError, MhashResult};
pub use hash::{Filler, GetHandle, Hash, KeyFn};
pub use item::{Item, ItemFiller};
pub use key::{splitmix64, Key, RootKey};
pub use pipeline::Pipeline;
pub use session::Session;

#[cfg(test)]
pub(crate) mod mock_client;
