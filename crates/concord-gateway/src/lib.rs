//! # concord-gateway
//!
//! Discord gateway client core: keeps a WebSocket session alive and turns its event stream
//! into typed listener calls.
//!
//! ## Features
//!
//! - **Connection state machine**: HELLO, IDENTIFY/RESUME, RECONNECT and INVALID_SESSION
//!   handling with close-code classification and connect backoff
//! - **Heartbeats**: jittered first beat, zombie detection, latency tracking
//! - **Dispatch pipeline**: per-event transformers, cache writes ordered by
//!   [`CacheExecutionPolicy`](concord_cache::CacheExecutionPolicy), interaction collectors,
//!   compiled listeners
//! - **Debug channel**: tagged diagnostic events on a broadcast channel
//!
//! ## Example
//!
//! ```ignore
//! use concord_gateway::{Client, GatewayConfig};
//!
//! let client = Client::builder(GatewayConfig::new(token))
//!     .on("MESSAGE_CREATE", |ctx, args| async move {
//!         let message = args.first::<concord_core::Message>();
//!         // ...
//!     })
//!     .build()?;
//! client.run().await?;
//! ```

pub mod client;
pub mod collector;
pub mod config;
pub mod context;
pub mod debug;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod listener;
pub mod protocol;
pub mod rest;
pub mod session;
pub mod shard;

mod handlers;

pub use client::{Client, ClientBuilder};
pub use collector::{CollectorId, CollectorKey, CollectorOptions, CollectorRegistry};
pub use config::GatewayConfig;
pub use context::Context;
pub use debug::{DebugEmitter, DebugEvent, DebugTag};
pub use dispatch::{EventArgs, EventValue, ReturnArity, TransformerEntry, Transformed};
pub use error::{GatewayError, GatewayResult};
pub use listener::{EventModule, ListenerRegistry, RawEvent};
pub use protocol::{CloseCode, Intents, OpCode};
pub use rest::{GatewayInfo, GatewayUrlProvider, HttpGatewayUrlProvider, StaticGatewayUrl};
pub use session::Session;
pub use shard::{Shard, ShardHandle, ShardState};
