//! Interaction collectors
//!
//! Short-lived listeners for component interactions (buttons, selects), keyed by the invoking
//! user, the component custom id, or both. At most one collector fires per interaction;
//! `Both` collectors are checked before single-key ones. Expired collectors are swept lazily.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use concord_core::{Interaction, Snowflake};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;
use uuid::Uuid;

use crate::context::Context;

/// What a collector matches on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectorKey {
    /// Any interaction from this user
    User(Snowflake),
    /// Any interaction on a component with this custom id
    ButtonId(String),
    /// This user on this component
    Both(Snowflake, String),
}

impl CollectorKey {
    /// Keys an interaction can match, highest priority first
    fn candidates(interaction: &Interaction) -> Vec<Self> {
        let user = interaction.invoker_id();
        let custom_id = interaction.custom_id();

        let mut keys = Vec::with_capacity(3);
        if let (Some(user), Some(custom_id)) = (user, custom_id) {
            keys.push(Self::Both(user, custom_id.to_string()));
        }
        if let Some(custom_id) = custom_id {
            keys.push(Self::ButtonId(custom_id.to_string()));
        }
        if let Some(user) = user {
            keys.push(Self::User(user));
        }
        keys
    }
}

/// Unique handle of a registered collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectorId(Uuid);

impl CollectorId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for CollectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Collector callback
pub type CollectorFn = Arc<dyn Fn(Context, Interaction) -> BoxFuture<'static, ()> + Send + Sync>;

/// Registration options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorOptions {
    /// Remove the collector after it fires once
    pub one_shot: bool,
    /// Remove the collector after this long
    pub timeout: Option<Duration>,
}

impl CollectorOptions {
    #[must_use]
    pub fn one_shot() -> Self {
        Self {
            one_shot: true,
            timeout: None,
        }
    }

    #[must_use]
    pub fn persistent() -> Self {
        Self {
            one_shot: false,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for CollectorOptions {
    fn default() -> Self {
        Self::one_shot()
    }
}

struct Collector {
    id: CollectorId,
    callback: CollectorFn,
    one_shot: bool,
    expires_at: Option<Instant>,
}

impl Collector {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Registered collectors
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: DashMap<CollectorKey, Collector>,
}

impl CollectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector
    ///
    /// A collector already registered under the same key is replaced.
    pub fn register<F, Fut>(
        &self,
        key: CollectorKey,
        options: CollectorOptions,
        callback: F,
    ) -> CollectorId
    where
        F: Fn(Context, Interaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let now = Instant::now();
        self.sweep_expired(now);

        let id = CollectorId::new();
        let collector = Collector {
            id,
            callback: Arc::new(move |ctx, interaction| callback(ctx, interaction).boxed()),
            one_shot: options.one_shot,
            expires_at: options.timeout.map(|timeout| now + timeout),
        };

        if self.collectors.insert(key.clone(), collector).is_some() {
            tracing::debug!(key = ?key, "Replaced existing collector");
        }
        tracing::trace!(key = ?key, id = %id, "Collector registered");
        id
    }

    /// Remove a collector by id, returning whether it was registered
    pub fn cancel(&self, id: CollectorId) -> bool {
        let before = self.collectors.len();
        self.collectors.retain(|_, collector| collector.id != id);
        self.collectors.len() < before
    }

    /// Find the collector an interaction fires, removing it if one-shot
    pub fn take_match(&self, interaction: &Interaction) -> Option<CollectorFn> {
        let now = Instant::now();

        for key in CollectorKey::candidates(interaction) {
            let Entry::Occupied(entry) = self.collectors.entry(key) else {
                continue;
            };

            if entry.get().is_expired(now) {
                entry.remove();
                continue;
            }

            let callback = if entry.get().one_shot {
                entry.remove().callback
            } else {
                entry.get().callback.clone()
            };
            return Some(callback);
        }
        None
    }

    /// Drop every expired collector
    pub fn sweep_expired(&self, now: Instant) {
        self.collectors.retain(|_, collector| !collector.is_expired(now));
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}

impl std::fmt::Debug for CollectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorRegistry")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}
