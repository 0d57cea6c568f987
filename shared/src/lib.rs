// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("product not found: {0}")]
    ProductNotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("invalid counter value {value:?} under key {key}")]
    InvalidCounter { key: String, value: String },
    #[error("wrong type for key: {0}")]
    WrongType(String),
    #[error("reconciliation already in progress")]
    ReconcileInProgress,
    #[error("internal: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
