//! Gateway frame fixtures
//!
//! Provides reusable server frames and client configuration for integration tests.

use std::time::Duration;

use concord_gateway::GatewayConfig;
use serde_json::{json, Value};

/// Token used by every test client
pub const TEST_TOKEN: &str = "test-token";

/// Client configuration pointing at a mock gateway, with short delays
pub fn test_config(url: &str) -> GatewayConfig {
    GatewayConfig::new(TEST_TOKEN)
        .with_gateway_url(url)
        .with_reconnect_delay(Duration::from_millis(10), Duration::from_millis(50))
        .with_invalid_session_delay(Duration::from_millis(5), Duration::from_millis(10))
}

pub fn hello(heartbeat_interval: u64) -> Value {
    json!({ "op": 10, "d": { "heartbeat_interval": heartbeat_interval } })
}

pub fn dispatch(event: &str, seq: u64, data: Value) -> Value {
    json!({ "op": 0, "t": event, "s": seq, "d": data })
}

/// READY with the mock gateway as resume url
pub fn ready(session_id: &str, resume_url: &str, seq: u64) -> Value {
    dispatch(
        "READY",
        seq,
        json!({
            "v": 10,
            "user": { "id": "99", "username": "concord", "bot": true },
            "guilds": [{ "id": "42", "unavailable": true }],
            "session_id": session_id,
            "resume_gateway_url": resume_url,
            "shard": [0, 1]
        }),
    )
}

pub fn resumed(seq: u64) -> Value {
    dispatch("RESUMED", seq, Value::Null)
}

pub fn reconnect() -> Value {
    json!({ "op": 7, "d": null })
}

pub fn invalid_session(resumable: bool) -> Value {
    json!({ "op": 9, "d": resumable })
}

pub fn guild(id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "channels": [{ "id": "100", "type": 0, "name": "general" }],
        "voice_states": []
    })
}

/// Button click by `user` on the component `custom_id`
pub fn button_click(user: u64, custom_id: &str) -> Value {
    json!({
        "id": "500",
        "application_id": "99",
        "type": 3,
        "token": "interaction-token",
        "guild_id": "42",
        "channel_id": "100",
        "member": { "user": { "id": user.to_string(), "username": "clicker" } },
        "data": { "custom_id": custom_id, "component_type": 2 }
    })
}
