//! READY payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::User;
use crate::value_objects::Snowflake;

/// Payload of the `READY` dispatch sent after a successful identify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    pub v: u8,
    /// The bot user
    pub user: User,
    /// Guilds the bot is in, sent as unavailable until their `GUILD_CREATE` arrives
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
    pub session_id: String,
    /// Url to use when resuming this session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
    /// `[shard_id, num_shards]` if sharding was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Guild placeholder listed in `READY`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}
