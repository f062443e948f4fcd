//! Listener context

use std::sync::Arc;

use concord_cache::InMemoryCache;

use crate::collector::CollectorRegistry;

/// Handed to every listener and collector callback
#[derive(Debug, Clone)]
pub struct Context {
    shard_id: u32,
    cache: Arc<InMemoryCache>,
    collectors: Arc<CollectorRegistry>,
}

impl Context {
    pub fn new(shard_id: u32, cache: Arc<InMemoryCache>, collectors: Arc<CollectorRegistry>) -> Self {
        Self {
            shard_id,
            cache,
            collectors,
        }
    }

    /// Shard the event arrived on
    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn cache(&self) -> &InMemoryCache {
        &self.cache
    }

    /// Register collectors from inside a listener
    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }
}
