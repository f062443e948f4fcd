//! Per-event dispatch

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::Poll;

use concord_cache::{CacheExecutionPolicy, CacheUpdate, InMemoryCache, SharedCacheDelegate};
use concord_core::Interaction;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::{panic_message, EventArgs, TransformContext, TransformerRegistry};
use crate::collector::CollectorRegistry;
use crate::context::Context;
use crate::debug::{DebugEmitter, DebugTag};
use crate::listener::{call_guarded, CompiledListeners, RawEvent};

const INTERACTION_CREATE: &str = "INTERACTION_CREATE";

/// A decoded DISPATCH frame
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub shard_id: u32,
    pub name: String,
    pub sequence: Option<u64>,
    pub data: Value,
}

/// Runs transformers, cache writes, collectors and listeners for each event
pub struct DispatchPipeline {
    transformers: TransformerRegistry,
    listeners: CompiledListeners,
    cache: Arc<InMemoryCache>,
    collectors: Arc<CollectorRegistry>,
    delegate: SharedCacheDelegate,
    policy: CacheExecutionPolicy,
    debug: DebugEmitter,
}

impl DispatchPipeline {
    pub fn new(
        transformers: TransformerRegistry,
        listeners: CompiledListeners,
        cache: Arc<InMemoryCache>,
        collectors: Arc<CollectorRegistry>,
        delegate: SharedCacheDelegate,
        policy: CacheExecutionPolicy,
        debug: DebugEmitter,
    ) -> Self {
        Self {
            transformers,
            listeners,
            cache,
            collectors,
            delegate,
            policy,
            debug,
        }
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.cache
    }

    pub fn collectors(&self) -> &Arc<CollectorRegistry> {
        &self.collectors
    }

    pub fn policy(&self) -> CacheExecutionPolicy {
        self.policy
    }

    /// Handle one dispatch event
    ///
    /// Returns once every listener has started; listener bodies keep running on the runtime.
    pub async fn dispatch(&self, event: DispatchEvent) {
        let DispatchEvent {
            shard_id,
            name,
            sequence,
            data,
        } = event;
        let ctx = Context::new(shard_id, self.cache.clone(), self.collectors.clone());

        let Some(entry) = self.transformers.get(&name) else {
            tracing::trace!(shard_id, event = %name, "No transformer, delivering raw payload");
            self.start_raw(&ctx, &name, sequence, &data).await;
            let listener = self.listeners.get(&name);
            start(&name, call_guarded(&name, || listener(ctx, EventArgs::single(data)))).await;
            return;
        };

        let transform_ctx = TransformContext {
            shard_id,
            cache: self.delegate.transformer_cache(),
        };
        let transformed = match entry.transform(&data, &transform_ctx) {
            Ok(transformed) => transformed,
            Err(e) => {
                tracing::warn!(shard_id, event = %name, error = %e, "Transformer failed");
                self.debug.for_shard(shard_id).emit(
                    DebugTag::TransformerFailure,
                    Some(serde_json::json!({"event": name, "error": e.to_string()})),
                );
                return;
            }
        };
        self.start_raw(&ctx, &name, sequence, &data).await;

        match self.policy {
            CacheExecutionPolicy::First => {
                self.write_cache(&name, &transformed.cache).await;
                self.start_listeners(ctx, &name, transformed.args).await;
            }
            CacheExecutionPolicy::Last => {
                self.start_listeners(ctx, &name, transformed.args).await;
                self.write_cache(&name, &transformed.cache).await;
            }
        }
    }

    async fn start_listeners(&self, ctx: Context, name: &str, args: EventArgs) {
        if name == INTERACTION_CREATE {
            if let Some(interaction) = args.first::<Interaction>() {
                if let Some(collector) = self.collectors.take_match(interaction) {
                    tracing::trace!(interaction_id = %interaction.id, "Collector matched");
                    let call = || collector(ctx.clone(), interaction.clone());
                    start(name, call_guarded(name, call)).await;
                }
            }
        }

        let listener = self.listeners.get(name);
        start(name, call_guarded(name, || listener(ctx, args))).await;
    }

    /// Hand the untransformed payload to the catch-all listener
    async fn start_raw(&self, ctx: &Context, name: &str, sequence: Option<u64>, data: &Value) {
        let Some(raw) = self.listeners.raw() else {
            return;
        };
        let event = RawEvent {
            name: name.to_string(),
            sequence,
            data: data.clone(),
        };
        start("*", call_guarded("*", || raw(ctx.clone(), event))).await;
    }

    async fn write_cache(&self, name: &str, updates: &[CacheUpdate]) {
        if updates.is_empty() {
            return;
        }
        if let Err(e) = self.delegate.apply(updates).await {
            tracing::warn!(event = %name, error = %e, "Cache write failed");
        }
    }
}

impl std::fmt::Debug for DispatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPipeline")
            .field("transformers", &self.transformers.len())
            .field("listeners", &self.listeners)
            .field("delegation", &self.delegate.delegation())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Start a listener: its synchronous prefix runs inline, the remainder on the runtime
async fn start(event: &str, future: BoxFuture<'static, ()>) {
    let mut future = AssertUnwindSafe(future).catch_unwind().boxed();

    match futures::poll!(&mut future) {
        Poll::Ready(Ok(())) => {}
        Poll::Ready(Err(panic)) => {
            tracing::warn!(event, panic = %panic_message(panic.as_ref()), "Listener panicked");
        }
        Poll::Pending => {
            let event = event.to_string();
            tokio::spawn(async move {
                if let Err(panic) = future.await {
                    tracing::warn!(
                        event = %event,
                        panic = %panic_message(panic.as_ref()),
                        "Listener panicked"
                    );
                }
            });
        }
    }
}
