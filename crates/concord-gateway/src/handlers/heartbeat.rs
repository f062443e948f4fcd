//! Heartbeat handlers (op 1, op 11)

use tokio::time::Instant;

use super::{ConnectionContext, HandlerResult};
use crate::debug::DebugTag;
use crate::protocol::GatewayMessage;
use crate::shard::ConnectionOutcome;

/// Handles heartbeat requests and acknowledgements
pub struct HeartbeatHandler;

impl HeartbeatHandler {
    /// The gateway asked for a heartbeat right away
    pub(crate) async fn handle(
        conn: &mut ConnectionContext,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        conn.debug().emit(DebugTag::HeartbeatRequested, None);

        // Only scheduled beats are tracked for zombie detection
        let sequence = conn.session().lock().sequence();
        conn.handshake
            .send(GatewayMessage::heartbeat(sequence))
            .await?;

        conn.debug().emit(
            DebugTag::HeartbeatSent,
            Some(serde_json::json!({ "seq": sequence, "requested": true })),
        );
        Ok(None)
    }

    /// Record liveness
    pub(crate) fn handle_ack(
        conn: &mut ConnectionContext,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        let latency = {
            let mut session = conn.session().lock();
            session.record_ack(Instant::now());
            session.latency()
        };

        tracing::trace!(
            shard_id = conn.shard_id(),
            latency_ms = latency.map(|l| l.as_millis() as u64),
            "Heartbeat acknowledged"
        );
        conn.debug().emit(
            DebugTag::HeartbeatAck,
            Some(serde_json::json!({
                "latency_ms": latency.map(|l| l.as_millis() as u64),
            })),
        );
        Ok(None)
    }
}
