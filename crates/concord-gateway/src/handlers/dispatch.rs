//! Dispatch handler (op 0)

use concord_core::Ready;
use serde_json::Value;

use super::{ConnectionContext, HandlerError, HandlerResult};
use crate::dispatch::DispatchEvent;
use crate::protocol::GatewayMessage;
use crate::shard::{ConnectionOutcome, ShardState};

/// Handles DISPATCH frames
pub struct DispatchHandler;

impl DispatchHandler {
    /// Track READY/RESUMED, then run the event through the dispatch pipeline
    pub(crate) async fn handle(
        conn: &mut ConnectionContext,
        message: GatewayMessage,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        let Some(name) = message.t else {
            return Err(HandlerError::InvalidPayload(
                "Dispatch without an event name".to_string(),
            ));
        };
        let data = message.d.unwrap_or(Value::Null);

        match name.as_str() {
            "READY" => {
                let ready: Ready = serde_json::from_value(data.clone())?;
                conn.session()
                    .lock()
                    .mark_ready(ready.session_id.clone(), ready.resume_gateway_url.clone());
                conn.handshake.status.set(ShardState::Connected);

                tracing::info!(
                    shard_id = conn.shard_id(),
                    session_id = %ready.session_id,
                    user = %ready.user.username,
                    guilds = ready.guilds.len(),
                    "Session ready"
                );
            }
            "RESUMED" => {
                conn.handshake.status.set(ShardState::Connected);
                tracing::info!(
                    shard_id = conn.shard_id(),
                    seq = ?conn.session().lock().sequence(),
                    "Session resumed"
                );
            }
            _ => {}
        }

        conn.pipeline
            .dispatch(DispatchEvent {
                shard_id: conn.shard_id(),
                name,
                sequence: message.s,
                data,
            })
            .await;
        Ok(None)
    }
}
