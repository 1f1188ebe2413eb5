//! Get-or-load accessor for cached values.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use crate::codec::Unmarshaler;
use crate::context::Context;
use crate::deferred::Deferred;
use crate::error::MhashResult;
use crate::pipeline::Pipeline;
use crate::session::Session;

/// Loads the bytes of a value from the authoritative store on cache miss.
#[async_trait]
pub trait ItemFiller<K>: Send + Sync {
    async fn fill(&self, ctx: &Context, key: &K) -> MhashResult<Bytes>;
}

/// Cached value accessor keyed by `K`, whose `Display` form is the cache key.
///
/// ```text
/// get(key) ──> pipeline.get(key.to_string())
///                 │ hit                     │ miss
///                 ▼                         ▼
///            unmarshal               filler.fill(key)  (next round)
///                                           │
///                                   unmarshal + write back
/// ```
///
/// Calls for a key whose load is still unresolved share that load, so a cold
/// key is filled and written back once however many lookups ask for it.
pub struct Item<V, K> {
    session: Session,
    pipeline: Arc<Pipeline>,
    unmarshaler: Unmarshaler<V>,
    filler: Arc<dyn ItemFiller<K>>,
    /// Unresolved loads by cache key.
    in_flight: Arc<Mutex<HashMap<String, Deferred<Arc<V>>>>>,
}

impl<V, K> Clone for Item<V, K> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            pipeline: Arc::clone(&self.pipeline),
            unmarshaler: Arc::clone(&self.unmarshaler),
            filler: Arc::clone(&self.filler),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<V, K> Item<V, K>
where
    V: Send + Sync + 'static,
    K: fmt::Display + Send + Sync + 'static,
{
    /// Create an accessor scheduled on the pipeline's session.
    pub fn new(
        pipeline: Arc<Pipeline>,
        unmarshaler: Unmarshaler<V>,
        filler: Arc<dyn ItemFiller<K>>,
    ) -> Self {
        Self {
            session: pipeline.session().clone(),
            pipeline,
            unmarshaler,
            filler,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch the value for `key`, loading it through the filler on miss.
    ///
    /// Nothing is sent until the session executes. A load shared with an
    /// earlier call runs with the context of that call.
    pub fn get(&self, ctx: &Context, key: K) -> Deferred<Arc<V>> {
        let cache_key = key.to_string();
        let result = {
            let mut in_flight = self.in_flight.lock();
            if let Some(pending) = in_flight.get(&cache_key) {
                return pending.clone();
            }
            let result = Deferred::new();
            in_flight.insert(cache_key.clone(), result.clone());
            result
        };

        let raw = self.pipeline.get(cache_key.clone());
        let item = self.clone();
        let ctx = ctx.clone();
        raw.then(&self.session, move |fetched| match fetched {
            Err(e) => item.complete(&cache_key, Err(e)),
            Ok(Some(data)) => {
                let value = (item.unmarshaler)(&data[..]).map(Arc::new);
                item.complete(&cache_key, value);
            }
            Ok(None) => {
                trace!(key = %cache_key, "cache miss, filling");
                let session = item.session.clone();
                session.add_task(async move {
                    let loaded = item.load(&ctx, &key, cache_key.clone()).await;
                    item.complete(&cache_key, loaded);
                });
            }
        });

        result
    }

    fn complete(&self, cache_key: &str, result: MhashResult<Arc<V>>) {
        let pending = self.in_flight.lock().remove(cache_key);
        if let Some(deferred) = pending {
            deferred.resolve(&self.session, result);
        }
    }

    async fn load(&self, ctx: &Context, key: &K, cache_key: String) -> MhashResult<Arc<V>> {
        let data = self.filler.fill(ctx, key).await?;
        let value = (self.unmarshaler)(&data[..])?;
        if self.pipeline.config().write_back_on_fill {
            self.pipeline.set(cache_key, data);
        }
        Ok(Arc::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::error::MhashError;
    use crate::mock_client::MockCacheClient;

    struct MapFiller {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ItemFiller<String> for MapFiller {
        async fn fill(&self, _ctx: &Context, key: &String) -> MhashResult<Bytes> {
            self.calls.lock().push(key.clone());
            if key == "broken" {
                return Err(MhashError::fill(key.as_str(), "store unavailable"));
            }
            Ok(Bytes::from(format!("filled {}", key)))
        }
    }

    fn string_unmarshaler() -> Unmarshaler<String> {
        Arc::new(|data: &[u8]| {
            String::from_utf8(data.to_vec()).map_err(|e| MhashError::decode(e.to_string()))
        })
    }

    fn new_item(
        client: Arc<MockCacheClient>,
        write_back: bool,
    ) -> (Item<String, String>, Arc<MapFiller>) {
        let config = PipelineConfig::builder()
            .write_back_on_fill(write_back)
            .build();
        let pipeline = Pipeline::new(client, Session::new(), config);
        let filler = Arc::new(MapFiller {
            calls: Mutex::new(Vec::new()),
        });
        let item = Item::new(pipeline, string_unmarshaler(), filler.clone());
        (item, filler)
    }

    #[tokio::test]
    async fn test_hit_skips_filler() {
        let client = Arc::new(MockCacheClient::new());
        client.put("a", "cached a");
        let (item, filler) = new_item(client.clone(), true);

        let value = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;

        assert_eq!(value.try_get(), Some(Ok(Arc::new("cached a".to_string()))));
        assert!(filler.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_miss_fills_and_writes_back() {
        let client = Arc::new(MockCacheClient::new());
        let (item, filler) = new_item(client.clone(), true);

        let value = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;

        assert_eq!(value.try_get(), Some(Ok(Arc::new("filled a".to_string()))));
        assert_eq!(*filler.calls.lock(), vec!["a".to_string()]);
        assert_eq!(client.get_data("a"), Some(Bytes::from("filled a")));
    }

    #[tokio::test]
    async fn test_miss_without_write_back() {
        let client = Arc::new(MockCacheClient::new());
        let (item, _filler) = new_item(client.clone(), false);

        let value = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;

        assert_eq!(value.try_get(), Some(Ok(Arc::new("filled a".to_string()))));
        assert!(client.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_fill_error() {
        let client = Arc::new(MockCacheClient::new());
        let (item, _filler) = new_item(client.clone(), true);

        let value = item.get(&Context::new(), "broken".to_string());
        item.session.execute().await;

        assert_eq!(
            value.try_get(),
            Some(Err(MhashError::fill("broken", "store unavailable")))
        );
        assert!(client.set_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unmarshal_error() {
        let client = Arc::new(MockCacheClient::new());
        client.put("a", vec![0xffu8, 0xfe]);
        let (item, _filler) = new_item(client.clone(), true);

        let value = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;

        assert!(matches!(value.try_get(), Some(Err(MhashError::Decode { .. }))));
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_fill() {
        let client = Arc::new(MockCacheClient::new());
        let (item, filler) = new_item(client.clone(), true);
        let ctx = Context::new();

        let values: Vec<_> = (0..10).map(|_| item.get(&ctx, "a".to_string())).collect();
        item.session.execute().await;

        for value in &values {
            assert_eq!(value.try_get(), Some(Ok(Arc::new("filled a".to_string()))));
        }
        assert_eq!(client.get_calls(), vec![vec!["a".to_string()]]);
        assert_eq!(*filler.calls.lock(), vec!["a".to_string()]);
        assert_eq!(client.set_calls(), vec![vec!["a".to_string()]]);
    }

    #[tokio::test]
    async fn test_resolved_load_is_not_reused() {
        let client = Arc::new(MockCacheClient::new());
        let (item, filler) = new_item(client.clone(), false);

        let first = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;
        let second = item.get(&Context::new(), "a".to_string());
        item.session.execute().await;

        assert_eq!(first.try_get(), second.try_get());
        assert_eq!(filler.calls.lock().len(), 2);
        assert_eq!(client.get_calls().len(), 2);
    }
}
