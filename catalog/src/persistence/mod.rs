pub mod sled_store;

pub use sled_store::SledCatalogStore;
