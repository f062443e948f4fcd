//! Entity storage

mod entity;
mod memory;

pub use entity::{CacheKind, CacheUpdate, CachedEntity};
pub use memory::InMemoryCache;
