use crate::domain::{ProductId, ViewCounterSettings};
use crate::keys::{baseline_key, parse_view_key, view_key};
use crate::ports::{CacheStore, CatalogStore};
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Buffers page-view increments in the cache store.
///
/// The first increment of a window seeds `productView::<id>` with the durable count and records
/// that count under `viewBaseline::<id>`; the pending delta is always `counter - baseline`
/// (a counter without baseline is a pure delta). Flushing is done by
/// [`ViewReconciler`](crate::planes::control::reconciler::ViewReconciler).
#[derive(Clone)]
pub struct ViewCounter {
    store: Arc<dyn CacheStore>,
    catalog: Arc<dyn CatalogStore>,
    settings: ViewCounterSettings,
}

impl ViewCounter {
    pub fn new(
        store: Arc<dyn CacheStore>,
        catalog: Arc<dyn CatalogStore>,
        settings: ViewCounterSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            settings,
        }
    }

    pub fn settings(&self) -> ViewCounterSettings {
        self.settings
    }

    pub async fn increment(&self, id: ProductId) -> Result<i64> {
        self.increment_at(&view_key(id), id).await
    }

    /// Add one view to the counter under `key` and return the counter value.
    /// `key` must be the counter key of `id`, anything else is rejected with `InvalidKey`.
    pub async fn increment_at(&self, key: &str, id: ProductId) -> Result<i64> {
        if parse_view_key(key)? != id {
            return Err(Error::InvalidKey(key.to_string()));
        }

        if self.store.get(key).await?.is_none() {
            self.seed(key, id).await?;
        }

        let count = self.store.incr(key).await?;

        if self.settings.sliding {
            self.store.expire(key, self.settings.ttl).await?;
            self.store.expire(&baseline_key(id), self.baseline_ttl()).await?;
        }

        Ok(count)
    }

    /// Write a raw pending count, e.g. when restoring counters.
    /// Drops the product's baseline first so the whole value counts as pending.
    pub async fn set_cached_view(&self, key: &str, raw_count: &str, ttl: Duration) -> Result<()> {
        if let Ok(id) = parse_view_key(key) {
            self.store.delete(&baseline_key(id)).await?;
        }

        self.store
            .set(key, raw_count.as_bytes().to_vec(), Some(ttl))
            .await
    }

    /// Views buffered for `id` and not yet flushed, `None` when no counter is live
    pub async fn pending(&self, id: ProductId) -> Result<Option<i64>> {
        let key = view_key(id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let counter = parse_counter(&key, &raw)?;
        let baseline = read_baseline(self.store.as_ref(), id).await?;
        Ok(Some(counter - baseline.unwrap_or(0)))
    }

    async fn seed(&self, key: &str, id: ProductId) -> Result<()> {
        let durable = self.catalog.current_view_count(id).await?;

        let seeded = self
            .store
            .seed_counter(
                key,
                &baseline_key(id),
                durable,
                self.settings.ttl,
                self.baseline_ttl(),
            )
            .await?;
        if !seeded {
            tracing::debug!("Counter {} was seeded concurrently", key);
        }

        Ok(())
    }

    // Outlives the counter so a live counter always finds its baseline
    fn baseline_ttl(&self) -> Duration {
        self.settings.ttl * 2
    }
}

impl std::fmt::Debug for ViewCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewCounter")
            .field("settings", &self.settings)
            .finish()
    }
}

/// Durable count the live counter of `id` was seeded from, `None` for raw counters
pub(crate) async fn read_baseline(store: &dyn CacheStore, id: ProductId) -> Result<Option<i64>> {
    let key = baseline_key(id);
    store
        .get(&key)
        .await?
        .map(|raw| parse_counter(&key, &raw))
        .transpose()
}

pub(crate) fn parse_counter(key: &str, raw: &[u8]) -> Result<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidCounter {
            key: key.to_string(),
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter("k", b"42").unwrap(), 42);
        assert_eq!(parse_counter("k", b"-7").unwrap(), -7);
    }

    #[test]
    fn test_parse_counter_rejects_non_numeric_values() {
        let result = parse_counter("productView::1", b"lots");
        match result {
            Err(Error::InvalidCounter { key, value }) => {
                assert_eq!(key, "productView::1");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(parse_counter("k", &[0xff, 0xfe]).is_err());
    }
}
