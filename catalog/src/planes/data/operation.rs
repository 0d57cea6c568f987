use crate::domain::response::BatchReport;
use crate::domain::{CategoryId, Product, ProductDetail, ProductId, ProductSummary, RankingEntry};
use async_trait::async_trait;
use shared::Result;
use std::time::Duration;

/// Read/write path operations exposed to request handlers and refresh jobs
#[async_trait]
pub trait ProductCacheOperations: Send + Sync + 'static {
    async fn warmup_detail_batch(&self, snapshots: &[ProductDetail]) -> Result<BatchReport>;

    async fn warmup_ranking_batch(
        &self,
        category: CategoryId,
        products: &[Product],
    ) -> Result<BatchReport>;

    async fn get_top_ranking(&self, category: CategoryId) -> Result<Vec<RankingEntry>>;

    async fn set_cached_view(&self, key: &str, raw_count: &str, ttl: Duration) -> Result<()>;

    async fn increment_view(&self, key: &str, product_id: ProductId) -> Result<i64>;

    async fn set_detail(&self, key: &str, snapshot: &ProductDetail, ttl: Duration) -> Result<()>;

    async fn set_ranking_entry(
        &self,
        key: &str,
        projection: &ProductSummary,
        score: f64,
    ) -> Result<bool>;
}
