//! Invalid session handler (op 9)

use super::{ConnectionContext, HandlerResult};
use crate::debug::DebugTag;
use crate::shard::ConnectionOutcome;

/// Handles INVALID_SESSION
pub struct InvalidSessionHandler;

impl InvalidSessionHandler {
    /// Retry the handshake on the same socket after a short random delay
    ///
    /// A resumable invalidation retries RESUME; otherwise the session is cleared and a fresh
    /// IDENTIFY goes out.
    pub(crate) fn handle(
        conn: &mut ConnectionContext,
        resumable: bool,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        let delay = conn.handshake.config.invalid_session_backoff();
        let shard_id = conn.shard_id();

        tracing::info!(
            shard_id,
            resumable,
            delay_ms = delay.as_millis() as u64,
            "Session invalidated"
        );
        conn.debug().emit(
            DebugTag::InvalidSession,
            Some(serde_json::json!({ "resumable": resumable })),
        );

        let handshake = conn.handshake.clone();
        let resume = resumable && conn.session().lock().is_resumable();

        let task = if resume {
            conn.debug().emit(
                DebugTag::ResumeAttempt,
                Some(serde_json::json!({ "delay_ms": delay.as_millis() as u64 })),
            );
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = handshake.resume().await {
                    tracing::warn!(shard_id, error = %e, "Delayed resume failed");
                }
            })
        } else {
            conn.session().lock().reset();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = handshake.identify().await {
                    tracing::warn!(shard_id, error = %e, "Delayed identify failed");
                }
            })
        };
        conn.schedule(task);

        Ok(None)
    }
}
