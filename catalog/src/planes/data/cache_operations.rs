use crate::codec::{Codec, JsonCodec};
use crate::domain::response::BatchReport;
use crate::domain::{
    CacheSettings, CategoryId, Product, ProductDetail, ProductId, ProductSummary, RankingEntry,
};
use crate::planes::control::reconciler::ViewReconciler;
use crate::planes::data::detail_cache::DetailCache;
use crate::planes::data::operation::ProductCacheOperations;
use crate::planes::data::ranking::RankingBoard;
use crate::planes::data::view_counter::ViewCounter;
use crate::ports::{CacheStore, CatalogStore};
use async_trait::async_trait;
use shared::Result;
use std::sync::Arc;
use std::time::Duration;

/// Application service that fronts the catalog read path
/// This is the main entry point for cache operations in the application core
#[derive(Clone)]
pub struct ProductCacheService<C: Codec = JsonCodec> {
    detail: DetailCache<C>,
    views: ViewCounter,
    ranking: RankingBoard<C>,
    reconciler: Arc<ViewReconciler>,
    settings: CacheSettings,
}

impl ProductCacheService<JsonCodec> {
    pub fn new(
        store: Arc<dyn CacheStore>,
        catalog: Arc<dyn CatalogStore>,
        settings: CacheSettings,
    ) -> Self {
        Self::with_codec(store, catalog, settings, JsonCodec)
    }
}

impl<C: Codec> ProductCacheService<C> {
    pub fn with_codec(
        store: Arc<dyn CacheStore>,
        catalog: Arc<dyn CatalogStore>,
        settings: CacheSettings,
        codec: C,
    ) -> Self {
        Self {
            detail: DetailCache::new(store.clone(), codec.clone(), settings.detail_ttl),
            views: ViewCounter::new(store.clone(), catalog.clone(), settings.views),
            ranking: RankingBoard::new(store.clone(), codec, settings.ranking_limit),
            reconciler: Arc::new(ViewReconciler::new(store, catalog)),
            settings,
        }
    }

    pub fn detail(&self) -> &DetailCache<C> {
        &self.detail
    }

    pub fn views(&self) -> &ViewCounter {
        &self.views
    }

    pub fn ranking(&self) -> &RankingBoard<C> {
        &self.ranking
    }

    /// Shared with the scheduler so manual and scheduled passes use the same overlap guard
    pub fn reconciler(&self) -> Arc<ViewReconciler> {
        self.reconciler.clone()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}

impl<C: Codec> std::fmt::Debug for ProductCacheService<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProductCacheService")
            .field("settings", &self.settings)
            .finish()
    }
}

#[async_trait]
impl<C: Codec> ProductCacheOperations for ProductCacheService<C> {
    async fn warmup_detail_batch(&self, snapshots: &[ProductDetail]) -> Result<BatchReport> {
        let report = self.detail.warmup_batch(snapshots).await?;
        tracing::info!("Warmed {} detail snapshot(s)", snapshots.len());
        Ok(report)
    }

    async fn warmup_ranking_batch(
        &self,
        category: CategoryId,
        products: &[Product],
    ) -> Result<BatchReport> {
        let report = self.ranking.warmup_batch(category, products).await?;
        tracing::info!(
            "Warmed ranking of category {} with {} product(s)",
            category,
            products.len()
        );
        Ok(report)
    }

    async fn get_top_ranking(&self, category: CategoryId) -> Result<Vec<RankingEntry>> {
        self.ranking.top_n(category).await
    }

    async fn set_cached_view(&self, key: &str, raw_count: &str, ttl: Duration) -> Result<()> {
        self.views.set_cached_view(key, raw_count, ttl).await
    }

    async fn increment_view(&self, key: &str, product_id: ProductId) -> Result<i64> {
        self.views.increment_at(key, product_id).await
    }

    async fn set_detail(&self, key: &str, snapshot: &ProductDetail, ttl: Duration) -> Result<()> {
        self.detail.set_at(key, snapshot, ttl).await
    }

    async fn set_ranking_entry(
        &self,
        key: &str,
        projection: &ProductSummary,
        score: f64,
    ) -> Result<bool> {
        self.ranking.set_entry_at(key, projection, score).await
    }
}
