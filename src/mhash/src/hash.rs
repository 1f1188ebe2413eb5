//! Extensible hash lookup engine.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{trace, warn};

use crate::bucket::{next_byte_offset, Bucket, BucketKey, MAX_DEEP_LEVELS};
use crate::codec::{bucket_unmarshaler, Unmarshaler};
use crate::context::Context;
use crate::deferred::Deferred;
use crate::error::{MhashError, MhashResult};
use crate::item::{Item, ItemFiller};
use crate::key::{Key, RootKey};
use crate::pipeline::Pipeline;
use crate::session::Session;

/// Rebuilds the encoded bucket at `(root_key, hash, hash_len)` from the
/// authoritative store when it is missing from the cache.
///
/// `hash` holds only the top `hash_len` bytes. The returned bytes must use
/// the [bucket layout](crate::codec).
#[async_trait]
pub trait Filler<R>: Send + Sync {
    async fn fill(
        &self,
        ctx: &Context,
        root_key: &R,
        hash: u64,
        hash_len: usize,
    ) -> MhashResult<Bytes>;
}

/// Adapts a [`Filler`] to the bucket item accessor.
struct BucketFiller<R> {
    filler: Arc<dyn Filler<R>>,
}

#[async_trait]
impl<R: RootKey> ItemFiller<BucketKey<R>> for BucketFiller<R> {
    async fn fill(&self, ctx: &Context, key: &BucketKey<R>) -> MhashResult<Bytes> {
        self.filler
            .fill(ctx, key.root_key(), key.hash(), key.hash_len())
            .await
    }
}

/// Extracts the key of an item.
pub type KeyFn<T, K> = Arc<dyn Fn(&T) -> K + Send + Sync>;

/// Read side of an extensible hash index stored in a remote cache.
///
/// Items of one root key are spread over buckets. A lookup starts at the root
/// bucket and follows the key hash one byte per level while the bucket's
/// bitset says the branch was split off, for at most [`MAX_DEEP_LEVELS`]
/// levels:
///
/// ```text
/// key hash = 0x3F_A2_...
///
/// "tenant:"      bitset[0x3F] set    ─> go deeper
/// "tenant:3f"    bitset[0xA2] unset  ─> scan items for the key
/// ```
///
/// Every level costs one cache round trip, but lookups sharing a
/// [`Session`] fetch their buckets of the same round together.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::new(client, Session::new(), PipelineConfig::default());
/// let index = Hash::new(pipeline, |u: &User| u.id, user_unmarshaler, filler);
///
/// let ctx = Context::new();
/// let a = index.get(&ctx, "tenant-1".to_string(), 10u64);
/// let b = index.get(&ctx, "tenant-1".to_string(), 11u64);
///
/// // One round trip for both root buckets.
/// let user_a = a.resolve().await?;
/// let user_b = b.resolve().await?;
/// ```
pub struct Hash<T, R, K> {
    session: Session,
    get_key: KeyFn<T, K>,
    bucket_item: Item<Bucket<T>, BucketKey<R>>,
}

impl<T, R, K> Hash<T, R, K>
where
    T: Clone + Send + Sync + 'static,
    R: RootKey,
    K: Key,
{
    /// Create a lookup engine scheduled on the pipeline's session.
    ///
    /// * `get_key` - projects an item onto its key
    /// * `unmarshaler` - decodes a single item; buckets are decoded around it
    /// * `filler` - loads bucket bytes on cache miss
    pub fn new<F>(
        pipeline: Arc<Pipeline>,
        get_key: F,
        unmarshaler: Unmarshaler<T>,
        filler: Arc<dyn Filler<R>>,
    ) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        let session = pipeline.session().clone();
        let bucket_item = Item::new(
            pipeline,
            bucket_unmarshaler(unmarshaler),
            Arc::new(BucketFiller { filler }),
        );
        Self {
            session,
            get_key: Arc::new(get_key),
            bucket_item,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Look up `key` in the index of `root_key`.
    ///
    /// Only the root bucket fetch is queued here; nothing is sent until the
    /// returned handle (or any other user of the session) executes it.
    pub fn get(&self, ctx: &Context, root_key: R, key: K) -> GetHandle<T> {
        let result = Deferred::new();
        let lookup = Arc::new(Lookup {
            ctx: ctx.clone(),
            root_key,
            key_hash: key.key_hash(),
            key,
            session: self.session.clone(),
            get_key: Arc::clone(&self.get_key),
            bucket_item: self.bucket_item.clone(),
            result: result.clone(),
        });
        lookup.fetch(0);

        GetHandle {
            session: self.session.clone(),
            result,
        }
    }
}

/// State of one lookup, shared by its per-level continuations.
struct Lookup<T, R, K> {
    ctx: Context,
    root_key: R,
    key: K,
    key_hash: u64,
    session: Session,
    get_key: KeyFn<T, K>,
    bucket_item: Item<Bucket<T>, BucketKey<R>>,
    result: Deferred<Option<T>>,
}

impl<T, R, K> Lookup<T, R, K>
where
    T: Clone + Send + Sync + 'static,
    R: RootKey,
    K: Key,
{
    fn fetch(self: Arc<Self>, depth: usize) {
        if let Err(e) = self.ctx.check() {
            self.finish(Err(e));
            return;
        }

        let bucket_key = BucketKey::at_depth(self.root_key.clone(), self.key_hash, depth);
        trace!(bucket = %bucket_key, depth, "fetching bucket");

        let bucket = self.bucket_item.get(&self.ctx, bucket_key);
        let session = self.session.clone();
        bucket.then(&session, move |fetched| self.on_bucket(depth, fetched));
    }

    fn on_bucket(self: Arc<Self>, depth: usize, fetched: MhashResult<Arc<Bucket<T>>>) {
        let bucket = match fetched.and_then(|b| self.ctx.check().map(|_| b)) {
            Ok(bucket) => bucket,
            Err(e) => {
                self.finish(Err(e));
                return;
            }
        };

        let offset = next_byte_offset(self.key_hash, depth);
        if bucket.bitset.get_bit(offset) {
            let next = depth + 1;
            if next >= MAX_DEEP_LEVELS {
                warn!(
                    root_key = %self.root_key,
                    key_hash = self.key_hash,
                    "hash index deeper than {} levels",
                    MAX_DEEP_LEVELS
                );
                self.finish(Err(MhashError::HashTooDeep));
                return;
            }
            self.fetch(next);
            return;
        }

        // First match in storage order wins.
        let found = bucket
            .items
            .iter()
            .find(|item| (self.get_key)(*item) == self.key)
            .cloned();
        self.finish(Ok(found));
    }

    fn finish(&self, result: MhashResult<Option<T>>) {
        self.result.resolve(&self.session, result);
    }
}

/// Pending result of [`Hash::get`].
pub struct GetHandle<T> {
    session: Session,
    result: Deferred<Option<T>>,
}

impl<T: Clone + Send + 'static> GetHandle<T> {
    /// Drain the session and return this lookup's outcome.
    ///
    /// Draining runs every lookup queued on the session, not only this one;
    /// resolving the other handles afterwards needs no further round trips.
    pub async fn resolve(self) -> MhashResult<Option<T>> {
        self.session.execute().await;
        self.result
            .try_get()
            .unwrap_or_else(|| Err(MhashError::internal("lookup did not complete")))
    }
}
