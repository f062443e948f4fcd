//! Client context
//!
//! The client owns everything a shard needs: configuration, cache, collectors, compiled
//! listeners and the gateway url source. Listeners and transformers are fixed at build time.

use std::future::Future;
use std::sync::Arc;

use concord_cache::{delegate_for, CacheAdapter, InMemoryCache};
use tokio::sync::broadcast;

use crate::collector::CollectorRegistry;
use crate::config::GatewayConfig;
use crate::context::Context;
use crate::debug::{DebugEmitter, DebugEvent};
use crate::dispatch::{DispatchPipeline, EventArgs, TransformerEntry, TransformerRegistry};
use crate::error::GatewayResult;
use crate::listener::{EventModule, ListenerRegistry, RawEvent};
use crate::rest::{GatewayUrlProvider, HttpGatewayUrlProvider, StaticGatewayUrl};
use crate::shard::Shard;

/// Configures a [`Client`]
pub struct ClientBuilder {
    config: GatewayConfig,
    listeners: ListenerRegistry,
    transformers: TransformerRegistry,
    adapter: Option<Arc<dyn CacheAdapter>>,
    provider: Option<Arc<dyn GatewayUrlProvider>>,
    debug: DebugEmitter,
}

impl ClientBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            listeners: ListenerRegistry::new(),
            transformers: TransformerRegistry::with_defaults(),
            adapter: None,
            provider: None,
            debug: DebugEmitter::default(),
        }
    }

    /// Listen to an event by name
    pub fn on<F, Fut>(mut self, event: impl Into<String>, listener: F) -> Self
    where
        F: Fn(Context, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on(event, listener);
        self
    }

    /// Listen to every dispatch before transformation
    pub fn on_raw<F, Fut>(mut self, listener: F) -> Self
    where
        F: Fn(Context, RawEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.listeners.on_raw(listener);
        self
    }

    /// Add the handlers of an event module
    pub fn module(mut self, module: &dyn EventModule) -> Self {
        self.listeners.register_module(module);
        self
    }

    /// Override or add the transformer of an event
    pub fn transformer(mut self, event: impl Into<String>, entry: TransformerEntry) -> Self {
        self.transformers = self.transformers.register(event, entry);
        self
    }

    /// Deliver an event untransformed
    pub fn without_transformer(mut self, event: &str) -> Self {
        self.transformers = self.transformers.remove(event);
        self
    }

    /// Adapter receiving cache writes under `External` delegation
    pub fn cache_adapter(mut self, adapter: Arc<dyn CacheAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Source of the gateway url, replacing the configured url or REST lookup
    pub fn gateway_url_provider(mut self, provider: Arc<dyn GatewayUrlProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Receive debug events, including the ones emitted while building
    pub fn subscribe_debug(&self) -> broadcast::Receiver<DebugEvent> {
        self.debug.subscribe()
    }

    /// Compile listeners and set up the cache
    pub fn build(self) -> GatewayResult<Client> {
        let config = Arc::new(self.config);
        let cache = Arc::new(InMemoryCache::new());
        let collectors = Arc::new(CollectorRegistry::new());
        let delegate = delegate_for(config.cache.delegation, cache.clone(), self.adapter)?;

        let provider: Arc<dyn GatewayUrlProvider> = match (self.provider, &config.gateway_url) {
            (Some(provider), _) => provider,
            (None, Some(url)) => Arc::new(StaticGatewayUrl::new(url.clone())),
            (None, None) => Arc::new(HttpGatewayUrlProvider::new(
                config.api_base_url.clone(),
                config.token.clone(),
            )?),
        };

        let listeners = self.listeners.compile(&self.debug);
        let pipeline = DispatchPipeline::new(
            self.transformers,
            listeners,
            cache,
            collectors,
            delegate,
            config.cache.policy,
            self.debug.clone(),
        );

        tracing::debug!(
            policy = ?config.cache.policy,
            delegation = ?config.cache.delegation,
            "Client built"
        );

        Ok(Client {
            config,
            pipeline: Arc::new(pipeline),
            provider,
            debug: self.debug,
        })
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("listeners", &self.listeners)
            .field("transformers", &self.transformers.len())
            .finish_non_exhaustive()
    }
}

/// Gateway client
#[derive(Clone)]
pub struct Client {
    config: Arc<GatewayConfig>,
    pipeline: Arc<DispatchPipeline>,
    provider: Arc<dyn GatewayUrlProvider>,
    debug: DebugEmitter,
}

impl Client {
    pub fn builder(config: GatewayConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Create a shard sharing this client's cache, collectors and listeners
    pub fn shard(&self, id: u32) -> Shard {
        Shard::new(
            id,
            self.config.clone(),
            self.pipeline.clone(),
            self.provider.clone(),
            &self.debug,
        )
    }

    /// Run the configured shard until shutdown or a fatal close
    pub async fn run(&self) -> GatewayResult<()> {
        self.shard(self.config.shard_id).run().await
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        self.pipeline.cache()
    }

    pub fn collectors(&self) -> &Arc<CollectorRegistry> {
        self.pipeline.collectors()
    }

    pub fn subscribe_debug(&self) -> broadcast::Receiver<DebugEvent> {
        self.debug.subscribe()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
