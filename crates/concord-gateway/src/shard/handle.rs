//! Handle to a running shard

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::ShardState;
use crate::error::{GatewayError, GatewayResult};
use crate::session::SharedSession;

/// Observe and control a shard from outside its run loop
#[derive(Debug, Clone)]
pub struct ShardHandle {
    id: u32,
    state: watch::Receiver<ShardState>,
    shutdown: Arc<watch::Sender<bool>>,
    session: SharedSession,
}

impl ShardHandle {
    pub(crate) fn new(
        id: u32,
        state: watch::Receiver<ShardState>,
        shutdown: Arc<watch::Sender<bool>>,
        session: SharedSession,
    ) -> Self {
        Self {
            id,
            state,
            shutdown,
            session,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current connection state
    pub fn state(&self) -> ShardState {
        *self.state.borrow()
    }

    /// Receive every state transition
    pub fn subscribe(&self) -> watch::Receiver<ShardState> {
        self.state.clone()
    }

    /// Wait until the shard reaches `target`
    ///
    /// Fails with [`GatewayError::ShardStopped`] if the shard stops first.
    pub async fn wait_for(&self, target: ShardState) -> GatewayResult<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|current| *current == target)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::ShardStopped)
    }

    /// Close the socket with code 1000 and make `run` return `Ok`
    pub fn shutdown(&self) {
        tracing::info!(shard_id = self.id, "Shutdown requested");
        self.shutdown.send_replace(true);
    }

    /// Round-trip time of the last acknowledged heartbeat
    pub fn latency(&self) -> Option<Duration> {
        self.session.lock().latency()
    }

    /// Last sequence number received
    pub fn sequence(&self) -> Option<u64> {
        self.session.lock().sequence()
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.lock().session_id().map(str::to_string)
    }
}
