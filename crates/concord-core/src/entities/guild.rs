//! Guild entity

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Channel, VoiceState};
use crate::value_objects::Snowflake;

/// A guild as delivered by `GUILD_CREATE` / `GUILD_UPDATE`
///
/// `channels` and `voice_states` are only populated on `GUILD_CREATE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
    #[serde(default)]
    pub unavailable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<Channel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_states: Vec<VoiceState>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
