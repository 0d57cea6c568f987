use crate::domain::{Product, ProductId, ViewDelta};
use crate::ports::CatalogStore;
use async_trait::async_trait;
use shared::{Error, Result};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

const PRODUCTS_TREE: &str = "products";

/// Sled-based durable catalog
#[derive(Clone)]
pub struct SledCatalogStore {
    db: sled::Db,
    products: sled::Tree,
}

impl SledCatalogStore {
    /// Open (or create) the catalog database at `path`
    /// Creates the parent directory if it doesn't exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("Failed to create directory: {}", e)))?;
        }

        let db = sled::open(path)
            .map_err(|e| Error::Unavailable(format!("Failed to open Sled database: {}", e)))?;
        Self::from_db(db)
    }

    /// Catalog backed by a throwaway database, removed when dropped
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| Error::Unavailable(format!("Failed to open Sled database: {}", e)))?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let products = db
            .open_tree(PRODUCTS_TREE)
            .map_err(|e| Error::Unavailable(format!("Failed to open products tree: {}", e)))?;
        Ok(Self { db, products })
    }

    async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| Error::Unavailable(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

fn product_key(id: ProductId) -> [u8; 8] {
    id.0.to_be_bytes()
}

fn decode(bytes: &[u8]) -> Result<Product> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Serialization(format!("Failed to deserialize product: {}", e)))
}

fn encode(product: &Product) -> Result<Vec<u8>> {
    serde_json::to_vec(product)
        .map_err(|e| Error::Serialization(format!("Failed to serialize product: {}", e)))
}

#[async_trait]
impl CatalogStore for SledCatalogStore {
    async fn current_view_count(&self, id: ProductId) -> Result<i64> {
        self.product(id)
            .await?
            .map(|product| product.view)
            .ok_or(Error::ProductNotFound(id.0))
    }

    async fn apply_view_deltas(&self, deltas: &[ViewDelta]) -> Result<()> {
        if deltas.is_empty() {
            return Ok(());
        }

        let result: std::result::Result<(), TransactionError<Error>> =
            self.products.transaction(|tx| {
                for delta in deltas {
                    let key = product_key(delta.product_id);
                    let raw = tx.get(&key[..])?.ok_or(ConflictableTransactionError::Abort(
                        Error::ProductNotFound(delta.product_id.0),
                    ))?;
                    let mut product = decode(&raw).map_err(ConflictableTransactionError::Abort)?;
                    product.view += delta.delta;
                    let bytes = encode(&product).map_err(ConflictableTransactionError::Abort)?;
                    tx.insert(&key[..], bytes)?;
                }
                Ok(())
            });

        match result {
            Ok(()) => self.flush().await,
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::Unavailable(format!(
                "Failed to apply view deltas: {}",
                e
            ))),
        }
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let value = self
            .products
            .get(product_key(id))
            .map_err(|e| Error::Unavailable(format!("Failed to get product: {}", e)))?;

        value.map(|bytes| decode(&bytes)).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = Vec::new();

        for item in self.products.iter() {
            let (_, value) = item
                .map_err(|e| Error::Unavailable(format!("Failed to iterate database: {}", e)))?;
            products.push(decode(&value)?);
        }

        Ok(products)
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let value = encode(&product)?;
        self.products
            .insert(product_key(product.id), value)
            .map_err(|e| Error::Unavailable(format!("Failed to save product: {}", e)))?;
        self.flush().await
    }
}

impl std::fmt::Debug for SledCatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledCatalogStore")
            .field("products", &self.products.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CategoryId;

    fn product(id: i64, view: i64) -> Product {
        Product {
            id: ProductId(id),
            category_id: CategoryId(1),
            name: format!("product-{id}"),
            description: String::new(),
            price: 1_000,
            thumbnail_url: None,
            view,
        }
    }

    #[tokio::test]
    async fn test_sled_catalog_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = SledCatalogStore::open(temp_dir.path().join("catalog.sled")).unwrap();

        store.upsert_product(product(1, 10)).await.unwrap();
        store.upsert_product(product(2, 20)).await.unwrap();

        assert_eq!(store.current_view_count(ProductId(2)).await.unwrap(), 20);
        assert_eq!(store.list_products().await.unwrap().len(), 2);
        assert!(store.product(ProductId(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_current_view_count_of_unknown_product() {
        let store = SledCatalogStore::temporary().unwrap();
        let result = store.current_view_count(ProductId(99)).await;
        assert!(matches!(result, Err(Error::ProductNotFound(99))));
    }

    #[tokio::test]
    async fn test_apply_view_deltas() {
        let store = SledCatalogStore::temporary().unwrap();
        store.upsert_product(product(1, 100)).await.unwrap();
        store.upsert_product(product(2, 50)).await.unwrap();

        store
            .apply_view_deltas(&[
                ViewDelta::new(ProductId(1), 5),
                ViewDelta::new(ProductId(2), 3),
            ])
            .await
            .unwrap();

        assert_eq!(store.current_view_count(ProductId(1)).await.unwrap(), 105);
        assert_eq!(store.current_view_count(ProductId(2)).await.unwrap(), 53);
    }

    #[tokio::test]
    async fn test_apply_view_deltas_is_all_or_nothing() {
        let store = SledCatalogStore::temporary().unwrap();
        store.upsert_product(product(1, 100)).await.unwrap();

        let result = store
            .apply_view_deltas(&[
                ViewDelta::new(ProductId(1), 5),
                ViewDelta::new(ProductId(404), 3),
            ])
            .await;

        assert!(matches!(result, Err(Error::ProductNotFound(404))));
        assert_eq!(store.current_view_count(ProductId(1)).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_open_creates_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("catalog.sled");

        let store = SledCatalogStore::open(&path).unwrap();
        store.upsert_product(product(5, 7)).await.unwrap();

        assert!(temp_dir.path().join("nested").is_dir());
        assert_eq!(store.current_view_count(ProductId(5)).await.unwrap(), 7);
    }
}
