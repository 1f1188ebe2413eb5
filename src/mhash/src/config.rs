//! Configuration for the cache pipeline.
//!
//! The lookup engine itself has no tunables: its depth bound is the fixed
//! [`MAX_DEEP_LEVELS`](crate::MAX_DEEP_LEVELS). What can be tuned is how the
//! pipeline talks to the cache backend.

use more_asserts as ma;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Configuration controlling how queued cache operations are flushed.
///
/// # Example
///
/// ```rust,ignore
/// let config = PipelineConfig::builder()
///     .max_batch_keys(50)       // memcached-style multi-get limit
///     .write_back_on_fill(true) // store filled buckets in the cache
///     .build();
///
/// config.validate(); // Ensures max_batch_keys > 0
/// ```
#[derive(Clone, Debug, PartialEq, TypedBuilder, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Maximum number of keys sent to the backend in a single call.
    ///
    /// A round with more pending keys is split into several calls:
    /// ```text
    /// max_batch_keys = 2, pending = [a, b, c]
    ///   get_multi([a, b])
    ///   get_multi([c])
    /// ```
    #[builder(default = PipelineConfig::DEFAULT_MAX_BATCH_KEYS)]
    #[serde(default = "PipelineConfig::default_max_batch_keys")]
    pub max_batch_keys: usize,

    /// Whether bucket bytes produced by a filler on cache miss are written
    /// back to the cache.
    #[builder(default = PipelineConfig::DEFAULT_WRITE_BACK_ON_FILL)]
    #[serde(default = "PipelineConfig::default_write_back_on_fill")]
    pub write_back_on_fill: bool,
}

impl PipelineConfig {
    /// Default maximum keys per backend call.
    pub const DEFAULT_MAX_BATCH_KEYS: usize = 100;

    /// Default write-back behaviour.
    pub const DEFAULT_WRITE_BACK_ON_FILL: bool = true;

    /// Get the default batch size for serde deserialization.
    pub fn default_max_batch_keys() -> usize {
        Self::DEFAULT_MAX_BATCH_KEYS
    }

    /// Get the default write-back flag for serde deserialization.
    pub fn default_write_back_on_fill() -> bool {
        Self::DEFAULT_WRITE_BACK_ON_FILL
    }

    /// Validate that configuration values are usable.
    ///
    /// # Panics
    ///
    /// Panics if `max_batch_keys` is zero.
    pub fn validate(&self) {
        ma::assert_gt!(self.max_batch_keys, 0);
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_keys: Self::DEFAULT_MAX_BATCH_KEYS,
            write_back_on_fill: Self::DEFAULT_WRITE_BACK_ON_FILL,
        }
    }
}
