//! # Error Types Module
//!
//! Failure classes shared by the collaborator boundaries (messaging transport,
//! catalog store, order ledger, contact registry). Handlers wrap these in
//! `anyhow::Error` with context; the poll loop only needs to know whether a
//! failure is worth retrying on the next tick.

use thiserror::Error;

/// Errors raised at the edges of the storefront
#[derive(Error, Debug)]
pub enum ShopError {
    /// Telegram Bot API failures (network, timeouts, API rejections)
    #[error("Transport error: {0}")]
    Transport(#[from] teloxide::RequestError),

    /// Database failures in the catalog, ledger or contact registry
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Order items could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The generated order id already exists in the ledger
    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(String),

    /// A product image reference could not be turned into an upload
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// A product or category id that cannot be carried in a button payload
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// A stored record does not decode into the domain model
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// A collaborator is unreachable for a reason other than the above
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShopError {
    /// Whether the failure is expected to clear up by itself on a later tick
    pub fn is_transient(&self) -> bool {
        match self {
            ShopError::Transport(err) => matches!(
                err,
                teloxide::RequestError::Network(_)
                    | teloxide::RequestError::RetryAfter(_)
                    | teloxide::RequestError::Io(_)
            ),
            ShopError::Storage(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            ShopError::Unavailable(_) => true,
            _ => false,
        }
    }
}

/// Result alias for collaborator operations
pub type ShopResult<T> = Result<T, ShopError>;
