//! Cache client trait for abstracting the remote key-value cache.
//!
//! This module defines the [`CacheClient`] trait which abstracts the cache
//! backend (memcached, Redis, ...) for testability.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::MhashResult;

/// Abstraction over the remote cache holding bucket bytes.
///
/// Each method call is one round trip to the backend. The pipeline collects
/// the keys of a whole round and issues them together, so implementations
/// should map `get_multi` onto the backend's native multi-get.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct MemcacheClient {
///     pool: Pool,
/// }
///
/// #[async_trait]
/// impl CacheClient for MemcacheClient {
///     async fn get_multi(&self, keys: &[String]) -> MhashResult<Vec<Option<Bytes>>> {
///         let mut conn = self.pool.get().await.map_err(|e| {
///             MhashError::backend("get_multi", &keys[0], e.to_string())
///         })?;
///         let found = conn.get_multi(keys).await.map_err(|e| {
///             MhashError::backend("get_multi", &keys[0], e.to_string())
///         })?;
///         Ok(keys.iter().map(|k| found.get(k).cloned()).collect())
///     }
///     // ... set_multi
/// }
/// ```
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Fetch several keys in one round trip.
    ///
    /// # Returns
    ///
    /// One entry per requested key, in the same order: `Some(bytes)` on a
    /// hit, `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip itself fails; the error applies to
    /// every key of the call.
    async fn get_multi(&self, keys: &[String]) -> MhashResult<Vec<Option<Bytes>>>;

    /// Store several entries in one round trip.
    async fn set_multi(&self, entries: &[(String, Bytes)]) -> MhashResult<()>;

    /// Fetch a single key.
    async fn get(&self, key: &str) -> MhashResult<Option<Bytes>> {
        let mut values = self.get_multi(&[key.to_string()]).await?;
        Ok(values.pop().flatten())
    }
}
