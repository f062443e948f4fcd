//! Hello handler (op 10)

use std::time::Duration;

use super::{ConnectionContext, HandlerError, HandlerResult};
use crate::heartbeat::Heartbeater;
use crate::protocol::HelloPayload;
use crate::shard::ConnectionOutcome;

/// Handles the HELLO frame opening every connection
pub struct HelloHandler;

impl HelloHandler {
    /// Start heartbeating, then resume the stored session or identify
    pub(crate) async fn handle(
        conn: &mut ConnectionContext,
        payload: HelloPayload,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        if payload.heartbeat_interval == 0 {
            return Err(HandlerError::InvalidPayload(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        let interval = Duration::from_millis(payload.heartbeat_interval);
        conn.hello_received = true;

        tracing::debug!(
            shard_id = conn.shard_id(),
            interval_ms = payload.heartbeat_interval,
            "Hello received"
        );

        let resumable = {
            let mut session = conn.session().lock();
            session.start_heartbeat(interval);
            session.is_resumable()
        };

        if let Some(previous) = conn.heartbeater.take() {
            previous.cancel();
        }
        conn.heartbeater = Some(Heartbeater::spawn(
            interval,
            conn.session().clone(),
            conn.handshake.outbound.clone(),
            conn.signals.clone(),
            conn.debug().clone(),
        ));

        if resumable {
            conn.handshake.resume().await?;
        } else {
            conn.handshake.identify().await?;
        }
        Ok(None)
    }
}
