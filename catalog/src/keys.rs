//! Key layout of the cache store.
//!
//! | Key | Type | Holds |
//! | --- | ---- | ----- |
//! | `Product::<productId>` | string or list | detail snapshot |
//! | `Ranking::<categoryId>` | sorted set | leaderboard of one category |
//! | `productView::<productId>` | string (integer) | pending view counter |
//! | `viewBaseline::<productId>` | string (integer) | durable count the counter was seeded from |

use crate::domain::{CategoryId, ProductId};
use shared::{Error, Result};

pub const DETAIL_PREFIX: &str = "Product";
pub const RANKING_PREFIX: &str = "Ranking";
pub const VIEW_PREFIX: &str = "productView";
pub const BASELINE_PREFIX: &str = "viewBaseline";

const SEPARATOR: &str = "::";

pub fn detail_key(id: ProductId) -> String {
    format!("{DETAIL_PREFIX}{SEPARATOR}{id}")
}

pub fn ranking_key(id: CategoryId) -> String {
    format!("{RANKING_PREFIX}{SEPARATOR}{id}")
}

pub fn view_key(id: ProductId) -> String {
    format!("{VIEW_PREFIX}{SEPARATOR}{id}")
}

pub fn baseline_key(id: ProductId) -> String {
    format!("{BASELINE_PREFIX}{SEPARATOR}{id}")
}

/// Recover the product id from a pending counter key
pub fn parse_view_key(key: &str) -> Result<ProductId> {
    let (prefix, id) = key
        .split_once(SEPARATOR)
        .ok_or_else(|| Error::InvalidKey(key.to_string()))?;

    if prefix != VIEW_PREFIX {
        return Err(Error::InvalidKey(key.to_string()));
    }

    id.parse::<i64>()
        .map(ProductId)
        .map_err(|_| Error::InvalidKey(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        assert_eq!(detail_key(ProductId(1)), "Product::1");
        assert_eq!(ranking_key(CategoryId(4)), "Ranking::4");
        assert_eq!(view_key(ProductId(19)), "productView::19");
        assert_eq!(baseline_key(ProductId(19)), "viewBaseline::19");
    }

    #[test]
    fn test_parse_view_key() {
        assert_eq!(parse_view_key("productView::19").unwrap(), ProductId(19));
        assert_eq!(
            parse_view_key(&view_key(ProductId(-3))).unwrap(),
            ProductId(-3)
        );
    }

    #[test]
    fn test_parse_view_key_rejects_malformed_keys() {
        for key in [
            "productView",
            "productView::",
            "productView::abc",
            "productViewX::1",
            "Product::1",
            "productView::1::2",
        ] {
            assert!(
                matches!(parse_view_key(key), Err(Error::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }
}
