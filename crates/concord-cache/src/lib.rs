//! # concord-cache
//!
//! Cache layer for gateway entities.
//!
//! ## Features
//!
//! - **In-memory store**: one independent concurrent map per cacheable kind
//!   (guild, channel, voice state, user)
//! - **Cache updates**: the write/delete instructions produced by event transformers
//! - **Delegation**: who performs those writes (built-in store, an external adapter, or the
//!   transformers themselves)
//!
//! ## Example
//!
//! ```ignore
//! use concord_cache::{CacheKind, CachedEntity, InMemoryCache};
//!
//! let cache = InMemoryCache::new();
//! cache.set(guild.id, CachedEntity::Guild(guild));
//! let cached = cache.get(CacheKind::Guild, guild_id);
//! ```

pub mod delegation;
pub mod store;

mod error;

pub use delegation::{
    delegate_for, CacheAdapter, CacheDelegate, DefaultDelegate, ExternalDelegate,
    SharedCacheDelegate, TransformerDelegate,
};
pub use error::{CacheError, CacheResult};
pub use store::{CacheKind, CacheUpdate, CachedEntity, InMemoryCache};

// Cache policy types live with the configuration
pub use concord_common::{CacheExecutionPolicy, CachingDelegation};
