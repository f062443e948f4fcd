//! Op code handlers
//!
//! Handles inbound gateway frames based on their operation code.

mod dispatch;
mod error;
mod heartbeat;
mod hello;
mod invalid_session;
mod reconnect;

pub use dispatch::DispatchHandler;
pub use error::{HandlerError, HandlerResult};
pub use heartbeat::HeartbeatHandler;
pub use hello::HelloHandler;
pub use invalid_session::InvalidSessionHandler;
pub use reconnect::ReconnectHandler;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::debug::{DebugEmitter, DebugTag};
use crate::dispatch::DispatchPipeline;
use crate::heartbeat::Heartbeater;
use crate::protocol::{GatewayMessage, IdentifyPayload, OpCode, ResumePayload};
use crate::session::SharedSession;
use crate::shard::{ConnectionOutcome, OutboundFrame, ShardSignal, ShardState, ShardStatus};

/// Everything the handshake frames need; cheap to clone into delayed tasks
#[derive(Debug, Clone)]
pub(crate) struct Handshake {
    pub shard_id: u32,
    pub config: Arc<GatewayConfig>,
    pub session: SharedSession,
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub status: ShardStatus,
    pub debug: DebugEmitter,
}

impl Handshake {
    pub async fn send(&self, message: GatewayMessage) -> HandlerResult<()> {
        self.outbound
            .send(OutboundFrame::Payload(message))
            .await
            .map_err(|_| HandlerError::ChannelClosed)
    }

    /// Start a new session
    pub async fn identify(&self) -> HandlerResult<()> {
        let payload = IdentifyPayload {
            token: self.config.token.clone(),
            intents: self.config.intents,
            properties: self.config.properties.clone(),
            shard: Some([self.shard_id, self.config.shard_count]),
        };
        self.send(GatewayMessage::identify(&payload)).await?;
        self.status.set(ShardState::Identifying);

        tracing::info!(
            shard_id = self.shard_id,
            intents = self.config.intents.bits(),
            "Identify sent"
        );
        self.debug.emit(
            DebugTag::IdentifySent,
            Some(serde_json::json!({
                "shard": [self.shard_id, self.config.shard_count],
                "intents": self.config.intents.bits(),
            })),
        );
        Ok(())
    }

    /// Resume the stored session, or identify when there is nothing to resume
    pub async fn resume(&self) -> HandlerResult<()> {
        let payload = {
            let session = self.session.lock();
            match (session.session_id(), session.sequence()) {
                (Some(session_id), Some(seq)) if session.is_resumable() => Some(ResumePayload {
                    token: self.config.token.clone(),
                    session_id: session_id.to_string(),
                    seq,
                }),
                _ => None,
            }
        };

        let Some(payload) = payload else {
            tracing::debug!(shard_id = self.shard_id, "Nothing to resume, identifying");
            return self.identify().await;
        };

        self.send(GatewayMessage::resume(&payload)).await?;
        self.status.set(ShardState::Resuming);

        tracing::info!(
            shard_id = self.shard_id,
            session_id = %payload.session_id,
            seq = payload.seq,
            "Resume sent"
        );
        self.debug.emit(
            DebugTag::ResumeSent,
            Some(serde_json::json!({
                "session_id": payload.session_id,
                "seq": payload.seq,
            })),
        );
        Ok(())
    }
}

/// Per-socket state owned by the read loop
pub(crate) struct ConnectionContext {
    pub handshake: Handshake,
    pub pipeline: Arc<DispatchPipeline>,
    pub signals: mpsc::UnboundedSender<ShardSignal>,
    pub heartbeater: Option<Heartbeater>,
    /// Delayed identify/resume scheduled by INVALID_SESSION
    pub pending: Option<JoinHandle<()>>,
    pub hello_received: bool,
}

impl ConnectionContext {
    pub fn new(
        handshake: Handshake,
        pipeline: Arc<DispatchPipeline>,
        signals: mpsc::UnboundedSender<ShardSignal>,
    ) -> Self {
        Self {
            handshake,
            pipeline,
            signals,
            heartbeater: None,
            pending: None,
            hello_received: false,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.handshake.shard_id
    }

    pub fn session(&self) -> &SharedSession {
        &self.handshake.session
    }

    pub fn debug(&self) -> &DebugEmitter {
        &self.handshake.debug
    }

    /// Replace the delayed handshake task, aborting the previous one
    pub fn schedule(&mut self, task: JoinHandle<()>) {
        if let Some(previous) = self.pending.replace(task) {
            previous.abort();
        }
    }

    /// Stop the heartbeat and any delayed handshake
    pub fn teardown(&mut self) {
        if let Some(heartbeater) = self.heartbeater.take() {
            heartbeater.cancel();
        }
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for ConnectionContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Route inbound frames to their handler
pub(crate) struct MessageDispatcher;

impl MessageDispatcher {
    /// Handle one decoded frame
    ///
    /// Returns an outcome when the frame ends the connection.
    pub async fn dispatch(
        conn: &mut ConnectionContext,
        message: GatewayMessage,
    ) -> HandlerResult<Option<ConnectionOutcome>> {
        if !message.op.is_server_op() {
            tracing::warn!(
                shard_id = conn.shard_id(),
                op = %message.op,
                "Received client-only op code from the gateway"
            );
            return Ok(None);
        }

        match message.op {
            OpCode::Hello => {
                let payload = message.payload()?;
                HelloHandler::handle(conn, payload).await
            }
            OpCode::Dispatch => DispatchHandler::handle(conn, message).await,
            OpCode::Heartbeat => HeartbeatHandler::handle(conn).await,
            OpCode::HeartbeatAck => HeartbeatHandler::handle_ack(conn),
            OpCode::Reconnect => ReconnectHandler::handle(conn),
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                InvalidSessionHandler::handle(conn, resumable)
            }
            // Filtered out by is_server_op above
            OpCode::Identify | OpCode::Resume => Ok(None),
        }
    }
}
