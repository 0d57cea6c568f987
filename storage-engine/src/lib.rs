//! Cache store adapters implementing the catalog's `CacheStore` port

pub mod moka_store;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use moka_store::MokaStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
