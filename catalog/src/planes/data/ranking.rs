use crate::codec::{Codec, JsonCodec};
use crate::domain::response::BatchReport;
use crate::domain::{CategoryId, Product, ProductSummary, RankingEntry};
use crate::keys::ranking_key;
use crate::pipeline::Pipeline;
use crate::planes::data::batcher::WarmupBatcher;
use crate::ports::CacheStore;
use shared::Result;
use std::sync::Arc;

/// Per-category leaderboard stored as a sorted set under `Ranking::<categoryId>`.
///
/// Scores are the view count at write time and are not kept in sync with pending increments;
/// they move only through [`RankingBoard::warmup_batch`] or [`RankingBoard::set_entry`].
#[derive(Clone)]
pub struct RankingBoard<C: Codec = JsonCodec> {
    store: Arc<dyn CacheStore>,
    batcher: WarmupBatcher<C>,
    limit: usize,
}

impl<C: Codec> RankingBoard<C> {
    pub fn new(store: Arc<dyn CacheStore>, codec: C, limit: usize) -> Self {
        Self {
            batcher: WarmupBatcher::new(store.clone(), codec),
            store,
            limit,
        }
    }

    /// (Re)seed a category in one round trip, scoring each product by its view count
    pub async fn warmup_batch(
        &self,
        category: CategoryId,
        products: &[Product],
    ) -> Result<BatchReport> {
        let key = ranking_key(category);
        let mut pipeline = Pipeline::with_capacity(products.len());
        for product in products {
            let member = self.batcher.encode(&product.summary())?;
            pipeline.zadd(key.as_str(), product.view as f64, member);
        }

        self.batcher.submit(pipeline).await
    }

    pub async fn set_entry(
        &self,
        category: CategoryId,
        projection: &ProductSummary,
        score: f64,
    ) -> Result<bool> {
        self.set_entry_at(&ranking_key(category), projection, score)
            .await
    }

    /// Add or re-score one member. Returns true when the member was not on the board yet.
    pub async fn set_entry_at(
        &self,
        key: &str,
        projection: &ProductSummary,
        score: f64,
    ) -> Result<bool> {
        let member = self.batcher.encode(projection)?;
        self.store.zadd(key, score, member).await
    }

    pub async fn top_n(&self, category: CategoryId) -> Result<Vec<RankingEntry>> {
        self.top_n_at(&ranking_key(category)).await
    }

    /// Members by descending score, at most `limit` of them
    pub async fn top_n_at(&self, key: &str) -> Result<Vec<RankingEntry>> {
        if self.limit == 0 {
            return Ok(Vec::new());
        }

        self.store
            .zrevrange_with_scores(key, 0, self.limit - 1)
            .await?
            .into_iter()
            .map(|(member, score)| {
                Ok(RankingEntry {
                    member: self.batcher.codec().decode(&member)?,
                    score,
                })
            })
            .collect()
    }
}
