#![allow(dead_code)]

use async_trait::async_trait;
use catalog::domain::{CacheSettings, CategoryId, Product, ProductId, ViewDelta};
use catalog::persistence::SledCatalogStore;
use catalog::pipeline::{CommandOutcome, Pipeline};
use catalog::planes::data::ProductCacheService;
use catalog::ports::{CacheStore, CatalogStore, Settlement};
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::MokaStore;
use tokio::sync::Notify;

pub fn product(id: i64, category: i64, view: i64) -> Product {
    Product {
        id: ProductId(id),
        category_id: CategoryId(category),
        name: format!("Product {id}"),
        description: format!("Description of product {id}"),
        price: 1_000 + id,
        thumbnail_url: Some(format!("https://img.example.com/{id}.png")),
        view,
    }
}

pub struct Harness {
    pub store: Arc<MokaStore>,
    pub catalog: Arc<SledCatalogStore>,
    pub service: ProductCacheService,
}

impl Harness {
    pub async fn new(settings: CacheSettings, products: Vec<Product>) -> Self {
        let store = Arc::new(MokaStore::new_unbounded());
        let catalog = Arc::new(SledCatalogStore::temporary().unwrap());
        for product in products {
            catalog.upsert_product(product).await.unwrap();
        }

        let service = ProductCacheService::new(store.clone(), catalog.clone(), settings);
        Self {
            store,
            catalog,
            service,
        }
    }

    pub async fn durable_views(&self, id: i64) -> i64 {
        self.catalog.current_view_count(ProductId(id)).await.unwrap()
    }

    pub async fn has_key(&self, key: &str) -> bool {
        self.store.get(key).await.unwrap().is_some()
    }
}

/// Catalog whose view transaction always fails
pub struct FailingCatalog {
    pub inner: Arc<SledCatalogStore>,
}

#[async_trait]
impl CatalogStore for FailingCatalog {
    async fn current_view_count(&self, id: ProductId) -> Result<i64> {
        self.inner.current_view_count(id).await
    }

    async fn apply_view_deltas(&self, _deltas: &[ViewDelta]) -> Result<()> {
        Err(Error::Unavailable("catalog offline".to_string()))
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        self.inner.product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.inner.upsert_product(product).await
    }
}

/// Catalog whose view transaction waits until released
pub struct GatedCatalog {
    pub inner: Arc<SledCatalogStore>,
    pub gate: Arc<Notify>,
}

#[async_trait]
impl CatalogStore for GatedCatalog {
    async fn current_view_count(&self, id: ProductId) -> Result<i64> {
        self.inner.current_view_count(id).await
    }

    async fn apply_view_deltas(&self, deltas: &[ViewDelta]) -> Result<()> {
        self.gate.notified().await;
        self.inner.apply_view_deltas(deltas).await
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        self.inner.product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.inner.upsert_product(product).await
    }
}

/// Cache store that holds every counter settlement until released
pub struct GatedCache {
    pub inner: Arc<MokaStore>,
    pub reached: Arc<Notify>,
    pub gate: Arc<Notify>,
}

#[async_trait]
impl CacheStore for GatedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.inner.ttl(key).await
    }

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        self.inner.rpush(key, value).await
    }

    async fn list_last(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.list_last(key).await
    }

    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool> {
        self.inner.zadd(key, score, member).await
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(Vec<u8>, f64)>> {
        self.inner.zrevrange_with_scores(key, start, stop).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn seed_counter(
        &self,
        counter: &str,
        baseline: &str,
        value: i64,
        ttl: Duration,
        baseline_ttl: Duration,
    ) -> Result<bool> {
        self.inner
            .seed_counter(counter, baseline, value, ttl, baseline_ttl)
            .await
    }

    async fn settle_counter(
        &self,
        counter: &str,
        baseline: &str,
        flushed: i64,
        baseline_seen: Option<i64>,
    ) -> Result<Settlement> {
        self.reached.notify_one();
        self.gate.notified().await;
        self.inner
            .settle_counter(counter, baseline, flushed, baseline_seen)
            .await
    }

    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<CommandOutcome>> {
        self.inner.execute(pipeline).await
    }
}
