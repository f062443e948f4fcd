//! Channel entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::value_objects::Snowflake;

/// A guild channel, thread, or direct message channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    /// Raw channel type (0 = guild text, 1 = DM, 2 = guild voice, 4 = category, ...)
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Channel {
    /// Check if this is a direct message channel
    #[must_use]
    pub fn is_dm(&self) -> bool {
        matches!(self.kind, 1 | 3)
    }
}
