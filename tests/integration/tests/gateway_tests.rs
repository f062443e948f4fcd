//! Gateway Integration Tests
//!
//! Drive a real client against the in-process mock gateway over WebSocket.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::sync::Arc;
use std::time::Duration;

use concord_cache::{CacheExecutionPolicy, CachingDelegation};
use concord_common::CacheConfig;
use concord_core::{Guild, Snowflake};
use concord_gateway::{
    Client, ClientBuilder, CloseCode, CollectorKey, CollectorOptions, Context, DebugTag, EventArgs,
    GatewayConfig, GatewayError, GatewayResult, ShardHandle, ShardState,
};
use integration_tests::*;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Running {
    client: Client,
    handle: ShardHandle,
    task: JoinHandle<GatewayResult<()>>,
}

fn spawn_client(builder: ClientBuilder) -> Running {
    let client = builder.build().expect("Failed to build client");
    let shard = client.shard(0);
    let handle = shard.handle();
    let task = tokio::spawn(shard.run());
    Running {
        client,
        handle,
        task,
    }
}

async fn wait_for(handle: &ShardHandle, state: ShardState) {
    tokio::time::timeout(RECV_TIMEOUT, handle.wait_for(state))
        .await
        .expect("Timed out waiting for state")
        .expect("Shard stopped");
}

/// Open a connection and complete IDENTIFY/READY on it
async fn identify(
    gateway: &mut MockGateway,
    handle: &ShardHandle,
    heartbeat_interval: u64,
) -> MockConnection {
    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(heartbeat_interval));
    conn.recv_op(2).await.unwrap();
    conn.send(&ready("session-1", &gateway.url(), 1));
    wait_for(handle, ShardState::Connected).await;
    conn
}

async fn shutdown(running: Running, conn: &mut MockConnection) {
    running.handle.shutdown();
    assert_eq!(conn.recv_close().await.unwrap(), Some(1000));
    let result = tokio::time::timeout(RECV_TIMEOUT, running.task)
        .await
        .expect("Shard did not stop")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(running.handle.state(), ShardState::Disconnected);
}

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_identify_ready_and_dispatch() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();

    let builder = Client::builder(test_config(&gateway.url())).on("GUILD_CREATE", move |ctx, args| {
        // Cache-first: the guild is already cached when the listener starts
        let cached = args
            .first::<Guild>()
            .and_then(|guild| ctx.cache().guild(guild.id))
            .map(|guild| guild.name);
        let _ = tx.send(cached);
        async {}
    });
    let running = spawn_client(builder);

    let mut conn = gateway.accept().await.unwrap();
    let query = conn.query.clone().unwrap_or_default();
    assert!(query.contains("v=10"));
    assert!(query.contains("encoding=json"));

    conn.send(&hello(45_000));
    let identify = conn.recv_op(2).await.unwrap();
    assert_eq!(identify["d"]["token"], TEST_TOKEN);
    assert_eq!(identify["d"]["shard"], serde_json::json!([0, 1]));
    assert_eq!(running.handle.state(), ShardState::Identifying);

    conn.send(&ready("session-1", &gateway.url(), 1));
    wait_for(&running.handle, ShardState::Connected).await;
    assert_eq!(running.handle.session_id().as_deref(), Some("session-1"));

    conn.send(&dispatch("GUILD_CREATE", 2, guild(42, "rustaceans")));
    let seen = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(seen.as_deref(), Some("rustaceans"));

    let cache = running.client.cache();
    assert!(cache.channel(Snowflake::new(100)).is_some());
    assert!(cache.user(Snowflake::new(99)).is_some());
    assert_eq!(running.handle.sequence(), Some(2));

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_server_heartbeat_request_is_answered() {
    let mut gateway = MockGateway::start_silent().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&serde_json::json!({ "op": 1, "d": null }));
    let heartbeat = conn.recv_op(1).await.unwrap();
    assert_eq!(heartbeat["d"], 1);

    shutdown(running, &mut conn).await;
}

// ============================================================================
// Resume
// ============================================================================

#[tokio::test]
async fn test_zombie_connection_resumes() {
    let mut gateway = MockGateway::start_silent().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));

    let mut conn = identify(&mut gateway, &running.handle, 100).await;
    conn.send(&dispatch("GUILD_CREATE", 2, guild(42, "rustaceans")));

    // Heartbeats are never acknowledged: the client gives up on this socket
    assert_eq!(conn.recv_close().await.unwrap(), Some(4000));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000));
    let resume = conn.recv_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], "session-1");
    assert_eq!(resume["d"]["seq"], 2);
    assert_eq!(resume["d"]["token"], TEST_TOKEN);

    conn.send(&resumed(3));
    wait_for(&running.handle, ShardState::Connected).await;
    assert_eq!(running.handle.sequence(), Some(3));

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_reconnect_request_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&reconnect());
    assert_eq!(conn.recv_close().await.unwrap(), Some(4000));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000));
    let resume = conn.recv_op(6).await.unwrap();
    assert_eq!(resume["d"]["seq"], 1);

    conn.send(&resumed(2));
    wait_for(&running.handle, ShardState::Connected).await;
    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_resumable_close_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.close(CloseCode::UnknownError.as_u16());

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000));
    conn.recv_op(6).await.unwrap();
    conn.send(&resumed(2));
    wait_for(&running.handle, ShardState::Connected).await;
    shutdown(running, &mut conn).await;
}

// ============================================================================
// Session invalidation
// ============================================================================

#[tokio::test]
async fn test_session_expired_close_identifies() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let conn = identify(&mut gateway, &running.handle, 45_000).await;
    conn.send(&dispatch("GUILD_CREATE", 2, guild(42, "rustaceans")));

    conn.close(CloseCode::SessionTimedOut.as_u16());

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000));
    conn.recv_op(2).await.unwrap();

    // Everything tied to the old session is gone before the new IDENTIFY
    assert!(running.handle.session_id().is_none());
    assert!(running.handle.sequence().is_none());

    conn.send(&ready("session-2", &gateway.url(), 1));
    wait_for(&running.handle, ShardState::Connected).await;
    assert_eq!(running.handle.session_id().as_deref(), Some("session-2"));
    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_invalid_session_reidentifies() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&invalid_session(false));
    conn.recv_op(2).await.unwrap();
    assert!(running.handle.session_id().is_none());

    conn.send(&ready("session-2", &gateway.url(), 1));
    wait_for(&running.handle, ShardState::Connected).await;
    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_resumable_invalid_session_resumes() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&invalid_session(true));
    let resume = conn.recv_op(6).await.unwrap();
    assert_eq!(resume["d"]["session_id"], "session-1");

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_fatal_close_is_surfaced() {
    let mut gateway = MockGateway::start().await.unwrap();
    let running = spawn_client(Client::builder(test_config(&gateway.url())));

    let mut conn = gateway.accept().await.unwrap();
    conn.send(&hello(45_000));
    conn.recv_op(2).await.unwrap();
    conn.close(CloseCode::AuthenticationFailed.as_u16());

    let result = tokio::time::timeout(RECV_TIMEOUT, running.task)
        .await
        .expect("Shard did not stop")
        .unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err, GatewayError::Fatal(CloseCode::AuthenticationFailed)));
    assert_eq!(err.close_code(), Some(CloseCode::AuthenticationFailed));
    assert_eq!(running.handle.state(), ShardState::Disconnected);

    // No retry after a fatal close
    assert!(tokio::time::timeout(Duration::from_millis(200), gateway.accept())
        .await
        .is_err());
}

// ============================================================================
// Dispatch
// ============================================================================

async fn observed_guild_name(policy: CacheExecutionPolicy) -> Option<String> {
    let mut gateway = MockGateway::start().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<Option<String>>();

    let config = test_config(&gateway.url()).with_cache(CacheConfig {
        policy,
        delegation: CachingDelegation::Default,
    });
    let builder = Client::builder(config).on("GUILD_UPDATE", move |ctx, _| {
        let _ = tx.send(ctx.cache().guild(Snowflake::new(42)).map(|guild| guild.name));
        async {}
    });
    let running = spawn_client(builder);
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&dispatch("GUILD_CREATE", 2, guild(42, "old")));
    conn.send(&dispatch("GUILD_UPDATE", 3, serde_json::json!({ "id": "42", "name": "new" })));
    let seen = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();

    shutdown(running, &mut conn).await;
    seen
}

#[tokio::test]
async fn test_cache_first_policy() {
    assert_eq!(
        observed_guild_name(CacheExecutionPolicy::First).await.as_deref(),
        Some("new")
    );
}

#[tokio::test]
async fn test_cache_last_policy() {
    assert_eq!(
        observed_guild_name(CacheExecutionPolicy::Last).await.as_deref(),
        Some("old")
    );
}

#[tokio::test]
async fn test_untransformed_event_reaches_raw_listener() {
    let mut gateway = MockGateway::start().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Value)>();

    let builder = Client::builder(test_config(&gateway.url())).on_raw(move |_, event| {
        let _ = tx.send((event.name, event.data));
        async {}
    });
    let running = spawn_client(builder);
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    let payload = serde_json::json!({ "channel_id": "100", "user_id": "7", "timestamp": 1 });
    conn.send(&dispatch("TYPING_START", 2, payload.clone()));

    loop {
        let (name, data) = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        if name == "TYPING_START" {
            assert_eq!(data, payload);
            break;
        }
    }
    assert!(running.client.cache().guild(Snowflake::new(42)).is_none());

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_button_collector_fires_once() {
    let mut gateway = MockGateway::start().await.unwrap();
    let generic = Arc::new(Mutex::new(0usize));
    let counter = generic.clone();

    let builder = Client::builder(test_config(&gateway.url())).on("INTERACTION_CREATE", move |_, _| {
        *counter.lock() += 1;
        async {}
    });
    let running = spawn_client(builder);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    running.client.collectors().register(
        CollectorKey::Both(Snowflake::new(7), "btn-a".to_string()),
        CollectorOptions::one_shot(),
        move |_, interaction| {
            let _ = tx.send(interaction.custom_id().unwrap_or_default().to_string());
            async {}
        },
    );

    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;
    conn.send(&dispatch("INTERACTION_CREATE", 2, button_click(8, "btn-a")));
    conn.send(&dispatch("INTERACTION_CREATE", 3, button_click(7, "btn-a")));
    conn.send(&dispatch("INTERACTION_CREATE", 4, button_click(7, "btn-a")));

    let fired = tokio::time::timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(fired, "btn-a");

    // Wait until the last interaction went through the pipeline
    tokio::time::timeout(RECV_TIMEOUT, async {
        while *generic.lock() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert!(rx.try_recv().is_err());
    assert!(running.client.collectors().is_empty());

    shutdown(running, &mut conn).await;
}

fn panicking_listener(_: Context, _: EventArgs) -> std::future::Ready<()> {
    panic!("listener bug")
}

#[tokio::test]
async fn test_panicking_listener_keeps_shard_alive() {
    let mut gateway = MockGateway::start().await.unwrap();
    let builder = Client::builder(test_config(&gateway.url())).on("TYPING_START", panicking_listener);
    let running = spawn_client(builder);
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send(&dispatch("TYPING_START", 2, serde_json::json!({ "channel_id": "100" })));
    conn.send(&dispatch("GUILD_CREATE", 3, guild(42, "rustaceans")));

    tokio::time::timeout(RECV_TIMEOUT, async {
        while running.client.cache().guild(Snowflake::new(42)).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(running.handle.state(), ShardState::Connected);
    assert_eq!(running.handle.sequence(), Some(3));

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_bad_frames_are_dropped() {
    let mut gateway = MockGateway::start().await.unwrap();
    let builder = Client::builder(test_config(&gateway.url()));
    let mut debug_rx = builder.subscribe_debug();
    let running = spawn_client(builder);
    let mut conn = identify(&mut gateway, &running.handle, 45_000).await;

    conn.send_text("not json");
    conn.send(&serde_json::json!({ "op": 99, "s": 50, "d": null }));
    conn.send(&dispatch("GUILD_CREATE", 2, guild(42, "rustaceans")));

    let mut tags = Vec::new();
    while !(tags.contains(&DebugTag::DecodeFailure) && tags.contains(&DebugTag::UnknownOpcode)) {
        let event = tokio::time::timeout(RECV_TIMEOUT, debug_rx.recv())
            .await
            .unwrap()
            .unwrap();
        tags.push(event.tag);
    }

    tokio::time::timeout(RECV_TIMEOUT, async {
        while running.client.cache().guild(Snowflake::new(42)).is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // The undecodable frames never advanced the sequence
    assert_eq!(running.handle.sequence(), Some(2));
    assert_eq!(running.handle.state(), ShardState::Connected);

    shutdown(running, &mut conn).await;
}

#[tokio::test]
async fn test_shutdown_during_backoff() {
    // Nothing listens on this port
    let config: GatewayConfig = test_config("ws://127.0.0.1:9/gateway")
        .with_reconnect_delay(Duration::from_secs(10), Duration::from_secs(10));
    let client = Client::builder(config).build().unwrap();
    let shard = client.shard(0);
    let handle = shard.handle();
    let task = tokio::spawn(shard.run());

    wait_for(&handle, ShardState::Reconnecting).await;
    handle.shutdown();

    let result = tokio::time::timeout(RECV_TIMEOUT, task).await.unwrap().unwrap();
    assert!(result.is_ok());
}
