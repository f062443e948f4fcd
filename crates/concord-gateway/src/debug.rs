//! Debug channel
//!
//! Tagged diagnostic events published on a `tokio::sync::broadcast` channel. Every event is also
//! logged at debug level, so subscribing is optional.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

/// Default capacity of the debug channel
pub const DEBUG_CHANNEL_CAPACITY: usize = 256;

/// Debug event tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebugTag {
    MessageReceived,
    HeartbeatSent,
    HeartbeatAck,
    HeartbeatRequested,
    IdentifySent,
    ResumeSent,
    InvalidSession,
    ReconnectRequested,
    SocketError,
    MissedAck,
    ZombieConnection,
    ResumeAttempt,
    UnknownOpcode,
    ListenersCompiled,
    DecodeFailure,
    TransformerFailure,
}

impl DebugTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MessageReceived => "MESSAGE_RECEIVED",
            Self::HeartbeatSent => "HEARTBEAT_SENT",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
            Self::HeartbeatRequested => "HEARTBEAT_REQUESTED",
            Self::IdentifySent => "IDENTIFY_SENT",
            Self::ResumeSent => "RESUME_SENT",
            Self::InvalidSession => "INVALID_SESSION",
            Self::ReconnectRequested => "RECONNECT_REQUESTED",
            Self::SocketError => "SOCKET_ERROR",
            Self::MissedAck => "MISSED_ACK",
            Self::ZombieConnection => "ZOMBIE_CONNECTION",
            Self::ResumeAttempt => "RESUME_ATTEMPT",
            Self::UnknownOpcode => "UNKNOWN_OPCODE",
            Self::ListenersCompiled => "LISTENERS_COMPILED",
            Self::DecodeFailure => "DECODE_FAILURE",
            Self::TransformerFailure => "TRANSFORMER_FAILURE",
        }
    }
}

impl std::fmt::Display for DebugTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single debug event
#[derive(Debug, Clone, Serialize)]
pub struct DebugEvent {
    pub shard_id: u32,
    pub tag: DebugTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub at: DateTime<Utc>,
}

/// Publishes debug events
#[derive(Debug, Clone)]
pub struct DebugEmitter {
    tx: broadcast::Sender<DebugEvent>,
    shard_id: u32,
}

impl DebugEmitter {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, shard_id: 0 }
    }

    /// Emitter on the same channel tagging events with another shard id
    #[must_use]
    pub fn for_shard(&self, shard_id: u32) -> Self {
        Self {
            tx: self.tx.clone(),
            shard_id,
        }
    }

    /// Receive every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DebugEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, tag: DebugTag, payload: Option<Value>) {
        tracing::debug!(shard_id = self.shard_id, tag = %tag, payload = ?payload, "Gateway debug");

        // No subscribers is fine
        let _ = self.tx.send(DebugEvent {
            shard_id: self.shard_id,
            tag,
            payload,
            at: Utc::now(),
        });
    }
}

/// Trace every event of a subscription until the channel closes
///
/// Events dropped because the subscriber fell behind are counted and skipped. Returns how many
/// events were traced.
pub async fn trace_events(mut rx: broadcast::Receiver<DebugEvent>) -> u64 {
    let mut traced = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                tracing::trace!(shard_id = event.shard_id, tag = %event.tag, "Debug event");
                traced += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Debug subscriber lagged, events skipped");
            }
            Err(RecvError::Closed) => return traced,
        }
    }
}

impl Default for DebugEmitter {
    fn default() -> Self {
        Self::new(DEBUG_CHANNEL_CAPACITY)
    }
}
