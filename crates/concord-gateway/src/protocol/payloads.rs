//! Payload definitions for the handshake frames

use serde::{Deserialize, Serialize};

use super::Intents;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    /// `[shard_id, shard_count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
}

impl std::fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"<redacted>")
            .field("intents", &self.intents)
            .field("properties", &self.properties)
            .field("shard", &self.shard)
            .finish()
    }
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl IdentifyProperties {
    #[must_use]
    pub fn new(os: impl Into<String>, client: impl Into<String>) -> Self {
        let client = client.into();
        Self {
            os: os.into(),
            browser: client.clone(),
            device: client,
        }
    }
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self::new(std::env::consts::OS, "concord")
    }
}

/// Payload for op 6 (Resume)
#[derive(Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

impl std::fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"<redacted>")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}
