//! Caching and ranking-aggregation layer in front of the product catalog.
//!
//! - [`planes::data`]: detail cache, view counter, ranking board and the service facade
//! - [`planes::control`]: view reconciliation, its scheduler and the catalog refresh job
//! - [`ports`]: the cache store and durable catalog boundaries
//! - [`persistence`]: sled-backed durable catalog

pub mod codec;
pub mod domain;
pub mod keys;
pub mod persistence;
pub mod pipeline;
pub mod planes;
pub mod ports;

pub mod prelude {
    pub use crate::codec::{Codec, JsonCodec};
    pub use crate::domain::response::{BatchReport, ReconcileReport, RefreshReport};
    pub use crate::domain::*;
    pub use crate::pipeline::{Command, CommandOutcome, Pipeline};
    pub use crate::planes::control::{
        CatalogRefresh, ReconcileOperation, ReconcileScheduler, ViewReconciler,
    };
    pub use crate::planes::data::{ProductCacheOperations, ProductCacheService};
    pub use crate::ports::{CacheStore, CatalogStore};
}
