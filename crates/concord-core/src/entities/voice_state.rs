//! Voice state entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value_objects::Snowflake;

/// A user's voice connection status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    /// `None` once the user has left voice
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VoiceState {
    /// Check if the user is currently connected to a voice channel
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }
}
