//! Transformer registry
//!
//! Maps dispatch event names to the functions turning their raw payloads into listener
//! arguments and cache updates. Built once before the client starts; read-only afterwards.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use concord_cache::{CacheUpdate, InMemoryCache};
use serde_json::Value;

use super::defaults;
use super::EventArgs;

/// Number of listener arguments a transformer yields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnArity {
    Single,
    /// A fixed-size tuple spread positionally
    Multiple(usize),
}

impl ReturnArity {
    #[must_use]
    pub const fn expected(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Multiple(n) => n,
        }
    }
}

/// What a transformer may use besides the payload
pub struct TransformContext<'a> {
    pub shard_id: u32,
    /// Present when transformers are responsible for their own cache writes
    pub cache: Option<&'a InMemoryCache>,
}

/// Result of a transformer
#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub args: EventArgs,
    /// Automatic cache writes, applied according to the cache policy
    pub cache: Vec<CacheUpdate>,
}

impl Transformed {
    pub fn new(args: impl Into<EventArgs>) -> Self {
        Self {
            args: args.into(),
            cache: Vec::new(),
        }
    }

    pub fn with_update(mut self, update: CacheUpdate) -> Self {
        self.cache.push(update);
        self
    }

    pub fn with_updates(mut self, updates: impl IntoIterator<Item = CacheUpdate>) -> Self {
        self.cache.extend(updates);
        self
    }
}

/// Transformer errors
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Expected {expected} listener arguments, got {actual}")]
    Arity { expected: usize, actual: usize },

    #[error("Transformer panicked: {0}")]
    Panicked(String),
}

/// Transformer function
pub type TransformFn =
    Arc<dyn Fn(&Value, &TransformContext<'_>) -> Result<Transformed, TransformError> + Send + Sync>;

/// A registered transformer
#[derive(Clone)]
pub struct TransformerEntry {
    pub arity: ReturnArity,
    pub convert: TransformFn,
}

impl TransformerEntry {
    pub fn new<F>(arity: ReturnArity, convert: F) -> Self
    where
        F: Fn(&Value, &TransformContext<'_>) -> Result<Transformed, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            arity,
            convert: Arc::new(convert),
        }
    }

    pub fn single<F>(convert: F) -> Self
    where
        F: Fn(&Value, &TransformContext<'_>) -> Result<Transformed, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(ReturnArity::Single, convert)
    }

    /// Run the transformer, catching panics and checking the argument count
    pub fn transform(
        &self,
        data: &Value,
        ctx: &TransformContext<'_>,
    ) -> Result<Transformed, TransformError> {
        let transformed = catch_unwind(AssertUnwindSafe(|| (self.convert)(data, ctx)))
            .map_err(|panic| TransformError::Panicked(panic_message(panic.as_ref())))??;

        let expected = self.arity.expected();
        if transformed.args.len() != expected {
            return Err(TransformError::Arity {
                expected,
                actual: transformed.args.len(),
            });
        }
        Ok(transformed)
    }
}

impl std::fmt::Debug for TransformerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformerEntry")
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Event name to transformer mapping
#[derive(Debug, Clone, Default)]
pub struct TransformerRegistry {
    entries: HashMap<String, TransformerEntry>,
}

impl TransformerRegistry {
    /// Registry without any transformer; every event is delivered raw
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in transformers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (event, entry) in defaults::table() {
            registry.entries.insert(event.to_string(), entry);
        }
        registry
    }

    /// Add or replace the transformer of an event
    pub fn register(mut self, event: impl Into<String>, entry: TransformerEntry) -> Self {
        self.entries.insert(event.into(), entry);
        self
    }

    /// Remove the transformer of an event so it is delivered raw
    pub fn remove(mut self, event: &str) -> Self {
        self.entries.remove(event);
        self
    }

    pub fn get(&self, event: &str) -> Option<&TransformerEntry> {
        self.entries.get(event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.entries.contains_key(event)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
