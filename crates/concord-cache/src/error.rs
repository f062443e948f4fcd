//! Cache error types

use crate::CachingDelegation;

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// `External` delegation was selected without an adapter
    #[error("Cache delegation {0:?} requires an external adapter")]
    MissingAdapter(CachingDelegation),

    /// The external adapter failed to apply an update
    #[error("External cache adapter error: {0}")]
    Adapter(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
