pub mod batcher;
pub mod cache_operations;
pub mod detail_cache;
pub mod operation;
pub mod ranking;
pub mod view_counter;

pub use batcher::WarmupBatcher;
pub use cache_operations::ProductCacheService;
pub use detail_cache::DetailCache;
pub use operation::ProductCacheOperations;
pub use ranking::RankingBoard;
pub use view_counter::ViewCounter;
