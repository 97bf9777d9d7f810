// orgvault — Top-level error types
//
// Aggregates errors from the key and store modules into a single
// error enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all orgvault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Key error: {0}")]
    Key(#[from] crate::keys::KeyError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
