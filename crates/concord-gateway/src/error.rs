//! Gateway error types

use concord_cache::CacheError;

use crate::protocol::CloseCode;
use crate::rest::RestError;

/// Terminal errors surfaced to the application
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The gateway closed the connection with a non-recoverable code
    #[error("Gateway closed the connection: {0}")]
    Fatal(CloseCode),

    /// The gateway url lookup failed permanently
    #[error("Gateway url lookup failed: {0}")]
    Rest(#[from] RestError),

    #[error("Invalid gateway url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cache setup failed: {0}")]
    Cache(#[from] CacheError),

    /// The shard stopped before reaching the awaited state
    #[error("Shard stopped")]
    ShardStopped,
}

impl GatewayError {
    /// The close code behind a fatal disconnect
    #[must_use]
    pub fn close_code(&self) -> Option<CloseCode> {
        match self {
            Self::Fatal(code) => Some(*code),
            _ => None,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
