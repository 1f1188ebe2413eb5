//! Mock cache client for testing.
//!
//! This module provides an in-memory cache client that records every backend
//! call, so tests can count round trips.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::client::CacheClient;
use crate::error::{MhashError, MhashResult};

/// In-memory mock cache client for testing.
///
/// # Example
///
/// ```rust,ignore
/// let mock = MockCacheClient::new();
/// mock.put("user:1:", bucket_bytes);
///
/// let values = mock.get_multi(&["user:1:".to_string()]).await?;
/// assert_eq!(mock.get_calls(), vec![vec!["user:1:".to_string()]]);
/// ```
pub struct MockCacheClient {
    /// Storage for entries: key -> data
    objects: RwLock<HashMap<String, Bytes>>,
    /// Keys of every `get_multi` call, in call order.
    get_calls: RwLock<Vec<Vec<String>>>,
    /// Keys of every `set_multi` call, in call order.
    set_calls: RwLock<Vec<Vec<String>>>,
    /// A `get_multi` touching one of these keys fails with the given error.
    failures: RwLock<HashMap<String, MhashError>>,
}

impl MockCacheClient {
    /// Create a new empty mock client.
    pub fn new() -> Self {
        Self::with_objects(HashMap::new())
    }

    /// Create a mock client with pre-populated entries.
    pub fn with_objects(objects: HashMap<String, Bytes>) -> Self {
        Self {
            objects: RwLock::new(objects),
            get_calls: RwLock::new(Vec::new()),
            set_calls: RwLock::new(Vec::new()),
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Store an entry directly (synchronous, for tests).
    pub fn put(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.write().insert(key.into(), data.into());
    }

    /// Make every `get_multi` that includes `key` fail with `error`.
    pub fn fail_key(&self, key: impl Into<String>, error: MhashError) {
        self.failures.write().insert(key.into(), error);
    }

    /// Check if an entry exists.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Get entry data directly.
    pub fn get_data(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).cloned()
    }

    /// Keys of every recorded `get_multi` call.
    pub fn get_calls(&self) -> Vec<Vec<String>> {
        self.get_calls.read().clone()
    }

    /// Keys of every recorded `set_multi` call.
    pub fn set_calls(&self) -> Vec<Vec<String>> {
        self.set_calls.read().clone()
    }

    /// All keys fetched so far, flattened in call order.
    pub fn fetched_keys(&self) -> Vec<String> {
        self.get_calls.read().iter().flatten().cloned().collect()
    }
}

impl Default for MockCacheClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for MockCacheClient {
    async fn get_multi(&self, keys: &[String]) -> MhashResult<Vec<Option<Bytes>>> {
        self.get_calls.write().push(keys.to_vec());

        let failures = self.failures.read();
        if let Some(error) = keys.iter().find_map(|k| failures.get(k)) {
            return Err(error.clone());
        }

        let objects = self.objects.read();
        Ok(keys.iter().map(|k| objects.get(k).cloned()).collect())
    }

    async fn set_multi(&self, entries: &[(String, Bytes)]) -> MhashResult<()> {
        self.set_calls
            .write()
            .push(entries.iter().map(|(k, _)| k.clone()).collect());

        let mut objects = self.objects.write();
        for (key, data) in entries {
            objects.insert(key.clone(), data.clone());
        }
        Ok(())
    }
}

/// Builder for creating mock cache clients with test data.
pub struct MockCacheClientBuilder {
    objects: HashMap<String, Bytes>,
}

impl MockCacheClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
        }
    }

    /// Add an entry.
    pub fn with_object(mut self, key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.objects.insert(key.into(), data.into());
        self
    }

    /// Build the mock client.
    pub fn build(self) -> MockCacheClient {
        MockCacheClient::with_objects(self.objects)
    }
}

impl Default for MockCacheClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_get_multi() {
        let client = MockCacheClientBuilder::new()
            .with_object("a", "content-a")
            .build();

        let values = client
            .get_multi(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(Bytes::from("content-a")), None]);
        assert_eq!(client.get_calls(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[tokio::test]
    async fn test_mock_set_multi() {
        let client = MockCacheClient::new();

        client
            .set_multi(&[("a".to_string(), Bytes::from("1"))])
            .await
            .unwrap();

        assert!(client.contains("a"));
        assert_eq!(client.get("a").await.unwrap(), Some(Bytes::from("1")));
        assert_eq!(client.set_calls(), vec![vec!["a".to_string()]]);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let client = MockCacheClient::new();
        client.put("ok", "x");
        client.fail_key("broken", MhashError::backend("get_multi", "broken", "timeout"));

        assert!(client.get("ok").await.is_ok());

        let result = client
            .get_multi(&["ok".to_string(), "broken".to_string()])
            .await;
        assert!(matches!(result, Err(MhashError::Backend { .. })));
        assert_eq!(client.fetched_keys(), vec!["ok", "ok", "broken"]);
    }
}
