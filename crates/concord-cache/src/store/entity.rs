//! Cacheable entity kinds and cache update instructions

use concord_core::{Channel, Guild, Snowflake, User, VoiceState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of entities held by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheKind {
    Guild,
    Channel,
    VoiceState,
    User,
}

impl CacheKind {
    /// All cacheable kinds
    pub const ALL: [CacheKind; 4] = [Self::Guild, Self::Channel, Self::VoiceState, Self::User];

    /// Get the string representation of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guild => "GUILD",
            Self::Channel => "CHANNEL",
            Self::VoiceState => "VOICE_STATE",
            Self::User => "USER",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached value, tagged with its kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachedEntity {
    Guild(Guild),
    Channel(Channel),
    /// Voice states are keyed by user id
    VoiceState(VoiceState),
    User(User),
}

impl CachedEntity {
    /// The kind of this entity
    #[must_use]
    pub fn kind(&self) -> CacheKind {
        match self {
            Self::Guild(_) => CacheKind::Guild,
            Self::Channel(_) => CacheKind::Channel,
            Self::VoiceState(_) => CacheKind::VoiceState,
            Self::User(_) => CacheKind::User,
        }
    }

    /// The key this entity is stored under
    #[must_use]
    pub fn id(&self) -> Snowflake {
        match self {
            Self::Guild(guild) => guild.id,
            Self::Channel(channel) => channel.id,
            Self::VoiceState(state) => state.user_id,
            Self::User(user) => user.id,
        }
    }
}

/// A single write produced while handling a dispatch event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CacheUpdate {
    /// Insert or replace the entity under its own id
    Set { entity: CachedEntity },
    /// Remove an entry
    Delete { kind: CacheKind, id: Snowflake },
}

impl CacheUpdate {
    /// Create a set update
    #[must_use]
    pub fn set(entity: CachedEntity) -> Self {
        Self::Set { entity }
    }

    /// Create a delete update
    #[must_use]
    pub fn delete(kind: CacheKind, id: Snowflake) -> Self {
        Self::Delete { kind, id }
    }

    /// Kind of the entry this update touches
    #[must_use]
    pub fn kind(&self) -> CacheKind {
        match self {
            Self::Set { entity } => entity.kind(),
            Self::Delete { kind, .. } => *kind,
        }
    }

    /// Id of the entry this update touches
    #[must_use]
    pub fn id(&self) -> Snowflake {
        match self {
            Self::Set { entity } => entity.id(),
            Self::Delete { id, .. } => *id,
        }
    }
}

impl From<Guild> for CachedEntity {
    fn from(guild: Guild) -> Self {
        Self::Guild(guild)
    }
}

impl From<Channel> for CachedEntity {
    fn from(channel: Channel) -> Self {
        Self::Channel(channel)
    }
}

impl From<VoiceState> for CachedEntity {
    fn from(state: VoiceState) -> Self {
        Self::VoiceState(state)
    }
}

impl From<User> for CachedEntity {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> User {
        serde_json::from_value(serde_json::json!({"id": id.to_string(), "username": "u"})).unwrap()
    }

    #[test]
    fn test_entity_kind_and_id() {
        let entity = CachedEntity::from(user(7));
        assert_eq!(entity.kind(), CacheKind::User);
        assert_eq!(entity.id(), Snowflake::new(7));
    }

    #[test]
    fn test_voice_state_keyed_by_user() {
        let state: VoiceState = serde_json::from_value(serde_json::json!({
            "guild_id": "1", "channel_id": "2", "user_id": "3", "session_id": "s"
        }))
        .unwrap();
        let entity = CachedEntity::from(state);
        assert_eq!(entity.kind(), CacheKind::VoiceState);
        assert_eq!(entity.id(), Snowflake::new(3));
    }

    #[test]
    fn test_update_serialization() {
        let update = CacheUpdate::delete(CacheKind::Channel, Snowflake::new(5));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"op": "delete", "kind": "CHANNEL", "id": "5"})
        );
        assert_eq!(update.kind(), CacheKind::Channel);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CacheKind::VoiceState.to_string(), "VOICE_STATE");
    }
}
