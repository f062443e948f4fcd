//! Cache delegation strategies
//!
//! A delegate decides who performs the cache writes produced by event transformers:
//!
//! - [`DefaultDelegate`] writes every update to the built-in store
//! - [`ExternalDelegate`] hands every update to a [`CacheAdapter`] and never touches the store
//! - [`TransformerDelegate`] performs no automatic writes; transformers may write to the store
//!   themselves through [`CacheDelegate::transformer_cache`]
//!
//! The strategy is picked once with [`delegate_for`] when the client is built.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use crate::{CacheError, CacheResult, CacheUpdate, CachingDelegation, InMemoryCache};

/// Shared cache delegate
pub type SharedCacheDelegate = Arc<dyn CacheDelegate>;

/// Performs the automatic cache writes of a dispatch event
#[async_trait]
pub trait CacheDelegate: Send + Sync {
    /// The strategy this delegate implements
    fn delegation(&self) -> CachingDelegation;

    /// Apply the updates produced by a transformer, in order
    async fn apply(&self, updates: &[CacheUpdate]) -> CacheResult<()>;

    /// Store that transformers may write to directly, if this strategy allows it
    fn transformer_cache(&self) -> Option<&InMemoryCache> {
        None
    }
}

/// Writes cache updates somewhere other than the built-in store (a remote store, a database)
#[async_trait]
pub trait CacheAdapter: Send + Sync {
    async fn write(&self, update: &CacheUpdate) -> CacheResult<()>;
}

/// Writes to the built-in in-memory store
#[derive(Debug, Clone)]
pub struct DefaultDelegate {
    store: Arc<InMemoryCache>,
}

impl DefaultDelegate {
    pub fn new(store: Arc<InMemoryCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheDelegate for DefaultDelegate {
    fn delegation(&self) -> CachingDelegation {
        CachingDelegation::Default
    }

    async fn apply(&self, updates: &[CacheUpdate]) -> CacheResult<()> {
        for update in updates {
            self.store.apply(update);
        }
        Ok(())
    }
}

/// Forwards every update to an external adapter
#[derive(Clone)]
pub struct ExternalDelegate {
    adapter: Arc<dyn CacheAdapter>,
}

impl ExternalDelegate {
    pub fn new(adapter: Arc<dyn CacheAdapter>) -> Self {
        Self { adapter }
    }
}

impl std::fmt::Debug for ExternalDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalDelegate").finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheDelegate for ExternalDelegate {
    fn delegation(&self) -> CachingDelegation {
        CachingDelegation::External
    }

    #[instrument(skip(self, updates), fields(count = updates.len()))]
    async fn apply(&self, updates: &[CacheUpdate]) -> CacheResult<()> {
        for update in updates {
            self.adapter.write(update).await?;
        }
        Ok(())
    }
}

/// Leaves writes to the transformers
#[derive(Debug, Clone)]
pub struct TransformerDelegate {
    store: Arc<InMemoryCache>,
}

impl TransformerDelegate {
    pub fn new(store: Arc<InMemoryCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CacheDelegate for TransformerDelegate {
    fn delegation(&self) -> CachingDelegation {
        CachingDelegation::Transformers
    }

    async fn apply(&self, updates: &[CacheUpdate]) -> CacheResult<()> {
        if !updates.is_empty() {
            tracing::trace!(count = updates.len(), "Automatic cache writes suppressed");
        }
        Ok(())
    }

    fn transformer_cache(&self) -> Option<&InMemoryCache> {
        Some(&self.store)
    }
}

/// Build the delegate for a strategy
///
/// `External` requires an adapter; the other strategies ignore it.
pub fn delegate_for(
    delegation: CachingDelegation,
    store: Arc<InMemoryCache>,
    adapter: Option<Arc<dyn CacheAdapter>>,
) -> CacheResult<SharedCacheDelegate> {
    let delegate: SharedCacheDelegate = match delegation {
        CachingDelegation::Default => Arc::new(DefaultDelegate::new(store)),
        CachingDelegation::External => {
            let adapter = adapter.ok_or(CacheError::MissingAdapter(delegation))?;
            Arc::new(ExternalDelegate::new(adapter))
        }
        CachingDelegation::Transformers => Arc::new(TransformerDelegate::new(store)),
    };
    Ok(delegate)
}
