use crate::domain::response::RefreshReport;
use crate::domain::{CategoryId, Product, ProductDetail};
use crate::planes::data::operation::ProductCacheOperations;
use crate::ports::CatalogStore;
use futures::future::try_join_all;
use shared::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rebuilds the detail cache and every category leaderboard from the durable catalog.
/// Details go out as one batch, leaderboards as one batch per category.
pub struct CatalogRefresh {
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<dyn ProductCacheOperations>,
}

impl CatalogRefresh {
    pub fn new(catalog: Arc<dyn CatalogStore>, cache: Arc<dyn ProductCacheOperations>) -> Self {
        Self { catalog, cache }
    }

    pub async fn run(&self) -> Result<RefreshReport> {
        let products = self.catalog.list_products().await?;
        tracing::info!("Refreshing cache from {} catalog product(s)", products.len());

        let details: Vec<ProductDetail> = products.iter().map(Product::detail).collect();
        let detail_report = self.cache.warmup_detail_batch(&details).await?;

        let mut by_category: BTreeMap<CategoryId, Vec<Product>> = BTreeMap::new();
        for product in products {
            by_category
                .entry(product.category_id)
                .or_default()
                .push(product);
        }

        let ranking_reports = try_join_all(
            by_category
                .iter()
                .map(|(category, products)| self.cache.warmup_ranking_batch(*category, products)),
        )
        .await?;

        let report = RefreshReport {
            details: details.len(),
            categories: by_category.len(),
            ranking_entries: by_category.values().map(Vec::len).sum(),
            failed_commands: detail_report.failed()
                + ranking_reports.iter().map(|r| r.failed()).sum::<usize>(),
        };

        tracing::info!(
            "Cache refresh done: {} detail(s), {} categor(ies), {} failed command(s)",
            report.details,
            report.categories,
            report.failed_commands
        );

        Ok(report)
    }
}
