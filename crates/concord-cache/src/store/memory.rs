//! In-memory entity store
//!
//! One `DashMap` per kind so each kind can be swapped for a different backing structure
//! without touching the others. Writes are last-write-wins and atomic per key.

use super::{CacheKind, CacheUpdate, CachedEntity};
use concord_core::{Channel, Guild, Snowflake, User, VoiceState};
use dashmap::DashMap;

/// Built-in cache store
#[derive(Default)]
pub struct InMemoryCache {
    guilds: DashMap<Snowflake, Guild>,
    channels: DashMap<Snowflake, Channel>,
    voice_states: DashMap<Snowflake, VoiceState>,
    users: DashMap<Snowflake, User>,
}

impl InMemoryCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity under `id`, replacing any previous value of the same kind
    pub fn set(&self, id: Snowflake, entity: CachedEntity) {
        match entity {
            CachedEntity::Guild(guild) => {
                self.guilds.insert(id, guild);
            }
            CachedEntity::Channel(channel) => {
                self.channels.insert(id, channel);
            }
            CachedEntity::VoiceState(state) => {
                self.voice_states.insert(id, state);
            }
            CachedEntity::User(user) => {
                self.users.insert(id, user);
            }
        }
    }

    /// Get a copy of the entity stored under `(kind, id)`
    pub fn get(&self, kind: CacheKind, id: Snowflake) -> Option<CachedEntity> {
        match kind {
            CacheKind::Guild => self.guild(id).map(CachedEntity::Guild),
            CacheKind::Channel => self.channel(id).map(CachedEntity::Channel),
            CacheKind::VoiceState => self.voice_state(id).map(CachedEntity::VoiceState),
            CacheKind::User => self.user(id).map(CachedEntity::User),
        }
    }

    /// Remove the entity stored under `(kind, id)`, returning whether it existed
    pub fn delete(&self, kind: CacheKind, id: Snowflake) -> bool {
        match kind {
            CacheKind::Guild => self.guilds.remove(&id).is_some(),
            CacheKind::Channel => self.channels.remove(&id).is_some(),
            CacheKind::VoiceState => self.voice_states.remove(&id).is_some(),
            CacheKind::User => self.users.remove(&id).is_some(),
        }
    }

    /// Apply a single update
    pub fn apply(&self, update: &CacheUpdate) {
        match update {
            CacheUpdate::Set { entity } => self.set(entity.id(), entity.clone()),
            CacheUpdate::Delete { kind, id } => {
                self.delete(*kind, *id);
            }
        }
    }

    pub fn guild(&self, id: Snowflake) -> Option<Guild> {
        self.guilds.get(&id).map(|r| r.clone())
    }

    pub fn channel(&self, id: Snowflake) -> Option<Channel> {
        self.channels.get(&id).map(|r| r.clone())
    }

    /// Voice state of a user
    pub fn voice_state(&self, user_id: Snowflake) -> Option<VoiceState> {
        self.voice_states.get(&user_id).map(|r| r.clone())
    }

    pub fn user(&self, id: Snowflake) -> Option<User> {
        self.users.get(&id).map(|r| r.clone())
    }

    /// Number of entries of one kind
    pub fn len(&self, kind: CacheKind) -> usize {
        match kind {
            CacheKind::Guild => self.guilds.len(),
            CacheKind::Channel => self.channels.len(),
            CacheKind::VoiceState => self.voice_states.len(),
            CacheKind::User => self.users.len(),
        }
    }

    /// Check if no kind holds any entry
    pub fn is_empty(&self) -> bool {
        CacheKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.guilds.clear();
        self.channels.clear();
        self.voice_states.clear();
        self.users.clear();
    }
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("guilds", &self.guilds.len())
            .field("channels", &self.channels.len())
            .field("voice_states", &self.voice_states.len())
            .field("users", &self.users.len())
            .finish()
    }
}
