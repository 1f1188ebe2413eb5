//! Batching of cache operations into backend round trips.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::client::CacheClient;
use crate::config::PipelineConfig;
use crate::deferred::Deferred;
use crate::error::MhashError;
use crate::session::Session;

#[derive(Default)]
struct PendingOps {
    gets: Vec<(String, Deferred<Option<Bytes>>)>,
    /// Position of each key in `gets`, to share one fetch per key.
    get_index: HashMap<String, usize>,
    sets: Vec<(String, Bytes)>,
    flush_scheduled: bool,
}

/// Collects cache gets and sets issued during a session round and flushes
/// them together.
///
/// The first operation queued after a flush schedules the next flush as a
/// session task, so everything queued before that task runs ends up in the
/// same backend calls:
///
/// ```text
/// lookup A: get("user:1:")  ─┐
/// lookup B: get("user:1:")  ─┼─> get_multi(["user:1:", "user:2:"])
/// lookup C: get("user:2:")  ─┘
/// ```
pub struct Pipeline {
    client: Arc<dyn CacheClient>,
    session: Session,
    config: PipelineConfig,
    pending: Mutex<PendingOps>,
}

impl Pipeline {
    /// Create a pipeline flushing through `client`, scheduled on `session`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(client: Arc<dyn CacheClient>, session: Session, config: PipelineConfig) -> Arc<Self> {
        config.validate();
        Arc::new(Self {
            client,
            session,
            config,
            pending: Mutex::new(PendingOps::default()),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Queue a fetch of `key`; repeated keys in one batch share the result.
    pub fn get(self: &Arc<Self>, key: String) -> Deferred<Option<Bytes>> {
        let mut pending = self.pending.lock();
        if let Some(&idx) = pending.get_index.get(&key) {
            return pending.gets[idx].1.clone();
        }

        let deferred = Deferred::new();
        let idx = pending.gets.len();
        pending.get_index.insert(key.clone(), idx);
        pending.gets.push((key, deferred.clone()));
        self.schedule_flush(&mut pending);
        deferred
    }

    /// Queue a write of `data` under `key`.
    pub fn set(self: &Arc<Self>, key: String, data: Bytes) {
        let mut pending = self.pending.lock();
        pending.sets.push((key, data));
        self.schedule_flush(&mut pending);
    }

    fn schedule_flush(self: &Arc<Self>, pending: &mut PendingOps) {
        if pending.flush_scheduled {
            return;
        }
        pending.flush_scheduled = true;
        let pipeline = Arc::clone(self);
        self.session.add_task(async move { pipeline.flush().await });
    }

    /// Send everything queued so far to the backend.
    ///
    /// Sets go first. Write failures are only logged, since the cache is not
    /// authoritative. A failed get call resolves every key of that call with
    /// the error.
    pub async fn flush(&self) {
        let PendingOps { gets, sets, .. } = std::mem::take(&mut *self.pending.lock());

        for chunk in sets.chunks(self.config.max_batch_keys) {
            debug!(num_keys = chunk.len(), "flushing cache set batch");
            if let Err(e) = self.client.set_multi(chunk).await {
                warn!(error = %e, num_keys = chunk.len(), "cache write-back failed");
            }
        }

        for chunk in gets.chunks(self.config.max_batch_keys) {
            let keys: Vec<String> = chunk.iter().map(|(key, _)| key.clone()).collect();
            debug!(num_keys = keys.len(), "flushing cache get batch");

            match self.client.get_multi(&keys).await {
                Ok(values) if values.len() == keys.len() => {
                    for ((_, deferred), value) in chunk.iter().zip(values) {
                        deferred.resolve(&self.session, Ok(value));
                    }
                }
                Ok(values) => {
                    let err = MhashError::internal(format!(
                        "get_multi returned {} values for {} keys",
                        values.len(),
                        keys.len()
                    ));
                    for (_, deferred) in chunk {
                        deferred.resolve(&self.session, Err(err.clone()));
                    }
                }
                Err(e) => {
                    debug!(error = %e, num_keys = keys.len(), "cache get batch failed");
                    for (_, deferred) in chunk {
                        deferred.resolve(&self.session, Err(e.clone()));
                    }
                }
            }
        }
    }
}
