//! Shard connection state

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Connection state of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardState {
    /// Not connected; terminal once `run` has returned
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for HELLO
    AwaitingHello,
    /// IDENTIFY sent, waiting for READY
    Identifying,
    /// RESUME sent, waiting for RESUMED
    Resuming,
    /// READY or RESUMED received
    Connected,
    /// Socket closed, a new one is about to be opened
    Reconnecting,
}

impl ShardState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::AwaitingHello => "AWAITING_HELLO",
            Self::Identifying => "IDENTIFYING",
            Self::Resuming => "RESUMING",
            Self::Connected => "CONNECTED",
            Self::Reconnecting => "RECONNECTING",
        }
    }
}

impl std::fmt::Display for ShardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes state transitions of one shard
#[derive(Debug, Clone)]
pub(crate) struct ShardStatus {
    shard_id: u32,
    tx: Arc<watch::Sender<ShardState>>,
}

impl ShardStatus {
    pub fn new(shard_id: u32) -> Self {
        let (tx, _) = watch::channel(ShardState::Disconnected);
        Self {
            shard_id,
            tx: Arc::new(tx),
        }
    }

    pub fn get(&self) -> ShardState {
        *self.tx.borrow()
    }

    pub fn set(&self, state: ShardState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            tracing::debug!(
                shard_id = self.shard_id,
                from = %previous,
                to = %state,
                "Shard state changed"
            );
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ShardState> {
        self.tx.subscribe()
    }
}
