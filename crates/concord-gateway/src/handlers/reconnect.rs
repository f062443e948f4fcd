//! Reconnect handler (op 7)

use super::{ConnectionContext, HandlerResult};
use crate::debug::DebugTag;
use crate::shard::ConnectionOutcome;

/// Handles the gateway asking the client to reconnect
pub struct ReconnectHandler;

impl ReconnectHandler {
    pub(crate) fn handle(conn: &mut ConnectionContext) -> HandlerResult<Option<ConnectionOutcome>> {
        tracing::info!(shard_id = conn.shard_id(), "Gateway requested a reconnect");
        conn.debug().emit(DebugTag::ReconnectRequested, None);
        Ok(Some(ConnectionOutcome::Reconnect { resume: true }))
    }
}
