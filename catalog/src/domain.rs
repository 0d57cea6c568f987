use serde::{Deserialize, Serialize};
use shared::config::Config;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable product record, the source both cache projections are derived from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub thumbnail_url: Option<String>,
    pub view: i64,
}

impl Product {
    pub fn detail(&self) -> ProductDetail {
        ProductDetail {
            product_id: self.id,
            category_id: self.category_id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            thumbnail_url: self.thumbnail_url.clone(),
            view: self.view,
        }
    }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            product_id: self.id,
            name: self.name.clone(),
            price: self.price,
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

/// Snapshot served by the product detail page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product_id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub thumbnail_url: Option<String>,
    pub view: i64,
}

/// Main-page projection used as a leaderboard member.
///
/// Carries no view count: the score lives next to the member, and a member that changed with
/// every view would be stored as a new entry instead of replacing the old one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product_id: ProductId,
    pub name: String,
    pub price: i64,
    pub thumbnail_url: Option<String>,
}

/// Pending views to add to a product's durable total
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewDelta {
    pub product_id: ProductId,
    pub delta: i64,
}

impl ViewDelta {
    pub fn new(product_id: ProductId, delta: i64) -> Self {
        Self { product_id, delta }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RankingEntry {
    pub member: ProductSummary,
    pub score: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewCounterSettings {
    /// Lifetime of a counter window, counted from its first increment
    pub ttl: Duration,
    /// Refresh the TTL on every increment instead of keeping the first-increment window
    pub sliding: bool,
}

impl Default for ViewCounterSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(35 * 60),
            sliding: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheSettings {
    pub views: ViewCounterSettings,
    pub detail_ttl: Duration,
    pub ranking_limit: usize,
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            views: ViewCounterSettings {
                ttl: config.view_ttl,
                sliding: config.view_ttl_sliding,
            },
            detail_ttl: config.detail_ttl,
            ranking_limit: config.ranking_limit,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            views: ViewCounterSettings::default(),
            detail_ttl: Duration::from_secs(60 * 60),
            ranking_limit: 100,
        }
    }
}

pub mod response {
    use crate::pipeline::CommandOutcome;
    use chrono::{DateTime, Utc};

    /// Per-command outcomes of one pipelined submission
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct BatchReport {
        pub outcomes: Vec<CommandOutcome>,
    }

    impl BatchReport {
        pub fn new(outcomes: Vec<CommandOutcome>) -> Self {
            Self { outcomes }
        }

        pub fn submitted(&self) -> usize {
            self.outcomes.len()
        }

        pub fn failed(&self) -> usize {
            self.outcomes.iter().filter(|o| o.is_failure()).count()
        }

        pub fn is_complete(&self) -> bool {
            self.failed() == 0
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct ReconcileReport {
        /// Counter keys returned by the prefix scan
        pub scanned: usize,
        /// Counters flushed into the durable store and settled
        pub applied: usize,
        /// Counters left in place: unparseable key or value, or unknown product
        pub skipped: usize,
        pub total_delta: i64,
        pub finished_at: DateTime<Utc>,
    }

    impl ReconcileReport {
        pub fn empty() -> Self {
            Self {
                scanned: 0,
                applied: 0,
                skipped: 0,
                total_delta: 0,
                finished_at: Utc::now(),
            }
        }
    }

    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct RefreshReport {
        pub details: usize,
        pub categories: usize,
        pub ranking_entries: usize,
        pub failed_commands: usize,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId(7),
            category_id: CategoryId(3),
            name: "Desk lamp".to_string(),
            description: "Warm light".to_string(),
            price: 2_500,
            thumbnail_url: None,
            view: 42,
        }
    }

    #[test]
    fn test_projections_carry_identity() {
        let product = product();
        let detail = product.detail();
        assert_eq!(detail.product_id, ProductId(7));
        assert_eq!(detail.category_id, CategoryId(3));
        assert_eq!(detail.view, 42);

        let summary = product.summary();
        assert_eq!(summary.product_id, ProductId(7));
        assert_eq!(summary.name, "Desk lamp");
    }

    #[test]
    fn test_summary_is_stable_across_view_changes() {
        let mut product = product();
        let before = product.summary();
        product.view += 100;
        assert_eq!(before, product.summary());
    }

    #[test]
    fn test_settings_follow_config() {
        let settings = CacheSettings::from_config(&Config::default());
        assert_eq!(settings, CacheSettings::default());
        assert_eq!(settings.views.ttl, Duration::from_secs(2100));
    }

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ProductId(12)).unwrap();
        assert_eq!(json, "12");
    }
}
