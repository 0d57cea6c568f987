#![deny(clippy::all)]

use crate::domain::{Product, ProductId, ViewDelta};
use crate::pipeline::{CommandOutcome, Pipeline};
use async_trait::async_trait;
use shared::Result;
use std::time::Duration;

// Ports are the pluggable extension points for the remote cache store and the durable catalog

/// Port for the remote in-memory store (e.g., Redis).
///
/// Every method is one network round trip; `execute` is one round trip for the whole pipeline.
/// Each call is atomic on its own, sequences of calls are not.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// `ttl: None` stores the value without expiry and clears any previous one
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Store only if the key is absent. Returns whether the value was written.
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Atomically add one to an integer value; a missing key starts from zero without expiry.
    /// The remaining TTL of an existing key is left untouched.
    async fn incr(&self, key: &str) -> Result<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Remaining time to live, `None` for missing keys and keys without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;

    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64>;

    async fn list_last(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Add or re-score a sorted-set member. Returns true when the member is new.
    async fn zadd(&self, key: &str, score: f64, member: Vec<u8>) -> Result<bool>;

    /// Members by descending score, positions `start..=stop`
    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<(Vec<u8>, f64)>>;

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    async fn delete(&self, key: &str) -> Result<bool>;

    /// Open a counter window in one atomic step: when `counter` is absent, write `value` under
    /// both `counter` (expiring after `ttl`) and `baseline` (expiring after `baseline_ttl`).
    /// Returns false and writes nothing when the counter already exists.
    async fn seed_counter(
        &self,
        counter: &str,
        baseline: &str,
        value: i64,
        ttl: Duration,
        baseline_ttl: Duration,
    ) -> Result<bool>;

    /// Settle a counter whose pending views were just persisted, in one atomic step.
    ///
    /// `flushed` is the counter value that was read and `baseline_seen` the baseline read with
    /// it. Nothing is touched when the counter is gone or its baseline changed since (a new
    /// window). An unchanged counter is removed together with its baseline. A counter that
    /// moved on keeps counting and its baseline becomes `flushed`, so only the late views stay
    /// pending.
    async fn settle_counter(
        &self,
        counter: &str,
        baseline: &str,
        flushed: i64,
        baseline_seen: Option<i64>,
    ) -> Result<Settlement>;

    /// Submit all commands in one round trip, one outcome per command in submission order
    async fn execute(&self, pipeline: Pipeline) -> Result<Vec<CommandOutcome>>;
}

/// What [`CacheStore::settle_counter`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// Counter and baseline removed
    Cleared,
    /// Views arrived after the read; the baseline now points at the flushed value
    Rebased,
    /// Counter expired or was re-seeded in the meantime
    Untouched,
}

/// Port for the durable catalog, the source of truth for products and view totals
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn current_view_count(&self, id: ProductId) -> Result<i64>;

    /// Add every delta to its product's view total inside one transaction: either all of them
    /// are applied or none is.
    async fn apply_view_deltas(&self, deltas: &[ViewDelta]) -> Result<()>;

    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn upsert_product(&self, product: Product) -> Result<()>;
}
