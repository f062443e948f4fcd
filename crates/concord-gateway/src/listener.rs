//! Listener registry and compiler
//!
//! Listeners come from explicit registrations and from event modules. Before the socket opens
//! they are compiled into one composed function per event name.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::context::Context;
use crate::debug::{DebugEmitter, DebugTag};
use crate::dispatch::{panic_message, EventArgs};

/// Event listener
pub type ListenerFn = Arc<dyn Fn(Context, EventArgs) -> BoxFuture<'static, ()> + Send + Sync>;

/// Catch-all listener receiving every dispatch untransformed
pub type RawListenerFn = Arc<dyn Fn(Context, RawEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// An untransformed dispatch event
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub sequence: Option<u64>,
    pub data: Value,
}

/// A group of handlers contributed as a unit
pub trait EventModule: Send + Sync {
    fn name(&self) -> &str;

    fn register(&self, listeners: &mut ListenerRegistry);
}

/// Collects listeners before compilation
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<ListenerFn>>,
    raw: Vec<RawListenerFn>,
    modules: Vec<String>,
}

impl ListenerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to an event by name
    pub fn on<F, Fut>(&mut self, event: impl Into<String>, listener: F) -> &mut Self
    where
        F: Fn(Context, EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener: ListenerFn = Arc::new(move |ctx, args| listener(ctx, args).boxed());
        self.listeners.entry(event.into()).or_default().push(listener);
        self
    }

    /// Listen to every dispatch before transformation
    pub fn on_raw<F, Fut>(&mut self, listener: F) -> &mut Self
    where
        F: Fn(Context, RawEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.raw
            .push(Arc::new(move |ctx, event| listener(ctx, event).boxed()));
        self
    }

    /// Add the handlers of a module
    pub fn register_module(&mut self, module: &dyn EventModule) -> &mut Self {
        module.register(self);
        self.modules.push(module.name().to_string());
        self
    }

    /// Number of listeners registered for an event
    pub fn count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    /// Merge everything into one function per event
    pub fn compile(self, debug: &DebugEmitter) -> CompiledListeners {
        let mut events: Vec<_> = self
            .listeners
            .iter()
            .map(|(event, listeners)| (event.clone(), listeners.len()))
            .collect();
        events.sort();

        let handlers = self
            .listeners
            .into_iter()
            .map(|(event, listeners)| {
                let composed = compose(&event, listeners);
                (event, composed)
            })
            .collect();

        let raw = match self.raw.len() {
            0 => None,
            1 => self.raw.into_iter().next(),
            _ => Some(compose_raw(self.raw)),
        };

        debug.emit(
            DebugTag::ListenersCompiled,
            Some(serde_json::json!({
                "events": events
                    .iter()
                    .map(|(event, count)| serde_json::json!({"event": event, "listeners": count}))
                    .collect::<Vec<_>>(),
                "raw": raw.is_some(),
                "modules": self.modules,
            })),
        );

        CompiledListeners {
            handlers,
            raw,
            noop: Arc::new(|_: Context, _: EventArgs| async {}.boxed()),
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("events", &self.listeners.keys().collect::<Vec<_>>())
            .field("raw", &self.raw.len())
            .field("modules", &self.modules)
            .finish()
    }
}

/// Run every listener of an event concurrently; a panicking listener does not stop the others
fn compose(event: &str, listeners: Vec<ListenerFn>) -> ListenerFn {
    if let [single] = listeners.as_slice() {
        return single.clone();
    }

    let event: Arc<str> = Arc::from(event);
    let listeners: Arc<[ListenerFn]> = listeners.into();
    Arc::new(move |ctx: Context, args: EventArgs| {
        let futures: Vec<_> = listeners
            .iter()
            .map(|listener| {
                let future = call_guarded(&event, || listener(ctx.clone(), args.clone()));
                isolate(event.clone(), future)
            })
            .collect();
        async move {
            join_all(futures).await;
        }
        .boxed()
    })
}

fn compose_raw(listeners: Vec<RawListenerFn>) -> RawListenerFn {
    let listeners: Arc<[RawListenerFn]> = listeners.into();
    Arc::new(move |ctx: Context, event: RawEvent| {
        let futures: Vec<_> = listeners
            .iter()
            .map(|listener| {
                let future = call_guarded("*", || listener(ctx.clone(), event.clone()));
                isolate(Arc::from("*"), future)
            })
            .collect();
        async move {
            join_all(futures).await;
        }
        .boxed()
    })
}

/// Call a listener, collector or raw listener
///
/// A panic raised before the listener hands back its future is reported and replaced by a
/// finished future.
pub(crate) fn call_guarded<F>(event: &str, call: F) -> BoxFuture<'static, ()>
where
    F: FnOnce() -> BoxFuture<'static, ()>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(future) => future,
        Err(panic) => {
            tracing::warn!(event, panic = %panic_message(panic.as_ref()), "Listener panicked");
            futures::future::ready(()).boxed()
        }
    }
}

async fn isolate(event: Arc<str>, future: BoxFuture<'static, ()>) {
    if let Err(panic) = AssertUnwindSafe(future).catch_unwind().await {
        tracing::warn!(
            event = %event,
            panic = %panic_message(panic.as_ref()),
            "Listener panicked"
        );
    }
}

/// Compiled listeners: one function per event
pub struct CompiledListeners {
    handlers: HashMap<String, ListenerFn>,
    raw: Option<RawListenerFn>,
    noop: ListenerFn,
}

impl CompiledListeners {
    /// Listener of an event; a no-op when nothing listens to it
    pub fn get(&self, event: &str) -> &ListenerFn {
        self.handlers.get(event).unwrap_or(&self.noop)
    }

    pub fn raw(&self) -> Option<&RawListenerFn> {
        self.raw.as_ref()
    }

    pub fn has(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    /// Names of the events with at least one listener
    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

impl Default for CompiledListeners {
    fn default() -> Self {
        ListenerRegistry::new().compile(&DebugEmitter::default())
    }
}

impl std::fmt::Debug for CompiledListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledListeners")
            .field("events", &self.handlers.keys().collect::<Vec<_>>())
            .field("raw", &self.raw.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorRegistry;
    use concord_cache::InMemoryCache;
    use concord_core::Snowflake;
    use parking_lot::Mutex;

    fn context() -> Context {
        Context::new(0, Arc::new(InMemoryCache::new()), Arc::new(CollectorRegistry::new()))
    }

    struct GreeterModule {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl EventModule for GreeterModule {
        fn name(&self) -> &str {
            "greeter"
        }

        fn register(&self, listeners: &mut ListenerRegistry) {
            let log = self.log.clone();
            listeners.on("GUILD_MEMBER_ADD", move |_, _| {
                let log = log.clone();
                async move { log.lock().push("module".to_string()) }
            });
        }
    }

    #[tokio::test]
    async fn test_compile_merges_sources_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();

        let explicit = log.clone();
        registry.on("GUILD_MEMBER_ADD", move |_, _| {
            let explicit = explicit.clone();
            async move { explicit.lock().push("explicit".to_string()) }
        });
        registry.register_module(&GreeterModule { log: log.clone() });
        assert_eq!(registry.count("GUILD_MEMBER_ADD"), 2);

        let debug = DebugEmitter::default();
        let mut debug_rx = debug.subscribe();
        let compiled = registry.compile(&debug);

        compiled.get("GUILD_MEMBER_ADD")(context(), EventArgs::single(Snowflake::new(1))).await;
        assert_eq!(*log.lock(), vec!["explicit".to_string(), "module".to_string()]);

        let event = debug_rx.recv().await.unwrap();
        assert_eq!(event.tag, DebugTag::ListenersCompiled);
        assert_eq!(event.payload.unwrap()["modules"][0], "greeter");
    }

    #[tokio::test]
    async fn test_missing_event_is_noop() {
        let compiled = ListenerRegistry::new().compile(&DebugEmitter::default());
        assert!(!compiled.has("TYPING_START"));
        compiled.get("TYPING_START")(context(), EventArgs::default()).await;
        assert!(compiled.raw().is_none());
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let ran = Arc::new(Mutex::new(false));
        let mut registry = ListenerRegistry::new();
        registry.on("MESSAGE_CREATE", |_, _| async {
            panic!("listener bug");
        });
        let flag = ran.clone();
        registry.on("MESSAGE_CREATE", move |_, _| {
            let flag = flag.clone();
            async move { *flag.lock() = true }
        });

        let compiled = registry.compile(&DebugEmitter::default());
        compiled.get("MESSAGE_CREATE")(context(), EventArgs::default()).await;
        assert!(*ran.lock());
    }

    fn listener_failing_on_call(_: Context, _: EventArgs) -> std::future::Ready<()> {
        panic!("listener bug before its future")
    }

    #[tokio::test]
    async fn test_listener_panicking_on_call_is_isolated() {
        let ran = Arc::new(Mutex::new(0));
        let mut registry = ListenerRegistry::new();
        registry.on("MESSAGE_CREATE", listener_failing_on_call);
        let count = ran.clone();
        registry.on("MESSAGE_CREATE", move |_, _| {
            *count.lock() += 1;
            async {}
        });
        registry.on_raw(|_, _| -> std::future::Ready<()> { panic!("raw listener bug") });
        registry.on_raw(|_, _| async {});

        let compiled = registry.compile(&DebugEmitter::default());
        compiled.get("MESSAGE_CREATE")(context(), EventArgs::default()).await;
        compiled.get("MESSAGE_CREATE")(context(), EventArgs::default()).await;
        assert_eq!(*ran.lock(), 2);

        let raw = compiled.raw().unwrap();
        raw(
            context(),
            RawEvent {
                name: "MESSAGE_CREATE".to_string(),
                sequence: None,
                data: Value::Null,
            },
        )
        .await;
    }

    #[test]
    fn test_call_guarded_replaces_panic_with_finished_future() {
        let future = call_guarded("MESSAGE_CREATE", || panic!("before the future"));
        assert!(future.now_or_never().is_some());
    }

    #[tokio::test]
    async fn test_raw_listeners() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ListenerRegistry::new();
        for _ in 0..2 {
            let seen = seen.clone();
            registry.on_raw(move |_, event| {
                let seen = seen.clone();
                async move { seen.lock().push(event.name) }
            });
        }

        let compiled = registry.compile(&DebugEmitter::default());
        let raw = compiled.raw().unwrap();
        raw(
            context(),
            RawEvent {
                name: "TYPING_START".to_string(),
                sequence: Some(3),
                data: Value::Null,
            },
        )
        .await;
        assert_eq!(seen.lock().len(), 2);
    }
}
