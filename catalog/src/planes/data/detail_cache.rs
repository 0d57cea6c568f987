use crate::codec::{Codec, JsonCodec};
use crate::domain::response::BatchReport;
use crate::domain::{ProductDetail, ProductId};
use crate::keys::detail_key;
use crate::pipeline::Pipeline;
use crate::planes::data::batcher::WarmupBatcher;
use crate::ports::CacheStore;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Per-product detail snapshots under `Product::<productId>`
#[derive(Clone)]
pub struct DetailCache<C: Codec = JsonCodec> {
    store: Arc<dyn CacheStore>,
    batcher: WarmupBatcher<C>,
    warmup_ttl: Duration,
}

impl<C: Codec> DetailCache<C> {
    /// `warmup_ttl` bounds the lifetime of entries written by [`DetailCache::warmup_batch`]
    pub fn new(store: Arc<dyn CacheStore>, codec: C, warmup_ttl: Duration) -> Self {
        Self {
            batcher: WarmupBatcher::new(store.clone(), codec),
            store,
            warmup_ttl,
        }
    }

    pub async fn set(&self, id: ProductId, snapshot: &ProductDetail, ttl: Duration) -> Result<()> {
        self.set_at(&detail_key(id), snapshot, ttl).await
    }

    /// Store/overwrite a snapshot under an explicit key, last write wins
    pub async fn set_at(&self, key: &str, snapshot: &ProductDetail, ttl: Duration) -> Result<()> {
        let value = self.batcher.encode(snapshot)?;
        self.store.set(key, value, Some(ttl)).await
    }

    /// Cached snapshot, `None` on a miss so the caller falls back to the catalog
    pub async fn get(&self, id: ProductId) -> Result<Option<ProductDetail>> {
        let key = detail_key(id);
        let raw = match self.store.get(&key).await {
            Ok(raw) => raw,
            // Warm-up appends snapshots to a list under the same key
            Err(Error::WrongType(_)) => self.store.list_last(&key).await?,
            Err(e) => return Err(e),
        };

        raw.map(|bytes| self.batcher.codec().decode(&bytes))
            .transpose()
    }

    pub async fn invalidate(&self, id: ProductId) -> Result<bool> {
        self.store.delete(&detail_key(id)).await
    }

    /// Append every snapshot to its own per-product list in a single round trip
    pub async fn warmup_batch(&self, snapshots: &[ProductDetail]) -> Result<BatchReport> {
        let mut pipeline = Pipeline::with_capacity(snapshots.len() * 2);
        for snapshot in snapshots {
            let key = detail_key(snapshot.product_id);
            pipeline
                .rpush(key.clone(), self.batcher.encode(snapshot)?)
                .expire(key, self.warmup_ttl);
        }

        self.batcher.submit(pipeline).await
    }
}
