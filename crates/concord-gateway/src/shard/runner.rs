//! Shard run loop

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{
    ConnectionOutcome, OutboundFrame, ShardHandle, ShardSignal, ShardState, ShardStatus,
    OUTBOUND_BUFFER_SIZE,
};
use crate::config::GatewayConfig;
use crate::debug::{DebugEmitter, DebugTag};
use crate::dispatch::DispatchPipeline;
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::{ConnectionContext, Handshake, MessageDispatcher};
use crate::protocol::{classify_close, CloseClassification, CloseCode, DecodeError, GatewayMessage, API_VERSION};
use crate::rest::GatewayUrlProvider;
use crate::session::{Session, SharedSession};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long teardown waits for the writer to flush the close frame
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// One gateway connection and its state machine
pub struct Shard {
    id: u32,
    config: Arc<GatewayConfig>,
    session: SharedSession,
    status: ShardStatus,
    shutdown: Arc<watch::Sender<bool>>,
    pipeline: Arc<DispatchPipeline>,
    provider: Arc<dyn GatewayUrlProvider>,
    debug: DebugEmitter,
}

impl Shard {
    pub fn new(
        id: u32,
        config: Arc<GatewayConfig>,
        pipeline: Arc<DispatchPipeline>,
        provider: Arc<dyn GatewayUrlProvider>,
        debug: &DebugEmitter,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id,
            config,
            session: Session::shared(),
            status: ShardStatus::new(id),
            shutdown: Arc::new(shutdown),
            pipeline,
            provider,
            debug: debug.for_shard(id),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handle(&self) -> ShardHandle {
        ShardHandle::new(
            self.id,
            self.status.subscribe(),
            self.shutdown.clone(),
            self.session.clone(),
        )
    }

    /// Connect and keep the session alive until shutdown or a fatal close
    ///
    /// Transient failures are retried internally; only fatal close codes, a rejected token on
    /// the gateway url lookup and malformed urls are returned.
    #[tracing::instrument(skip(self), fields(shard_id = self.id))]
    pub async fn run(self) -> GatewayResult<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        let Some(mut gateway_url) = self.resolve_gateway_url(&mut shutdown_rx).await? else {
            self.status.set(ShardState::Disconnected);
            return Ok(());
        };
        let mut attempt: u32 = 0;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let delay = self.config.backoff(attempt);
            if !delay.is_zero() {
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
                if sleep_or_shutdown(delay, &mut shutdown_rx).await {
                    break;
                }
            }

            let url = self.connect_url(&gateway_url)?;
            self.status.set(ShardState::Connecting);
            tracing::info!(url = %url, attempt, "Connecting to gateway");

            let socket = match connect_async(url.as_str()).await {
                Ok((socket, _)) => socket,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to open gateway socket");
                    self.debug.emit(
                        DebugTag::SocketError,
                        Some(serde_json::json!({ "error": e.to_string() })),
                    );
                    attempt = attempt.saturating_add(1);
                    self.status.set(ShardState::Reconnecting);
                    continue;
                }
            };
            self.status.set(ShardState::AwaitingHello);

            let (outcome, hello_received) = self.run_connection(socket, &mut shutdown_rx).await;
            attempt = if hello_received {
                0
            } else {
                attempt.saturating_add(1)
            };

            match outcome {
                ConnectionOutcome::Reconnect { resume: true } => {
                    tracing::info!("Reconnecting with session");
                    self.status.set(ShardState::Reconnecting);
                }
                ConnectionOutcome::Reconnect { resume: false } => {
                    tracing::info!("Reconnecting with a new session");
                    self.session.lock().reset();
                    self.status.set(ShardState::Reconnecting);
                    if self.config.refetch_gateway_url {
                        match self.resolve_gateway_url(&mut shutdown_rx).await? {
                            Some(url) => gateway_url = url,
                            None => break,
                        }
                    }
                }
                ConnectionOutcome::Fatal(code) => {
                    tracing::error!(close_code = code.as_u16(), reason = %code, "Fatal gateway close");
                    self.session.lock().reset();
                    self.status.set(ShardState::Disconnected);
                    return Err(GatewayError::Fatal(code));
                }
                ConnectionOutcome::Shutdown => break,
            }
        }

        tracing::info!("Shard stopped");
        self.status.set(ShardState::Disconnected);
        Ok(())
    }

    /// Socket url: the session's resume url when resuming, the gateway url otherwise
    fn connect_url(&self, gateway_url: &str) -> GatewayResult<String> {
        let resume_url = {
            let session = self.session.lock();
            if session.is_resumable() {
                session.resume_url().map(str::to_string)
            } else {
                None
            }
        };
        let base = resume_url.as_deref().unwrap_or(gateway_url);

        let mut url = reqwest::Url::parse(base).map_err(|e| GatewayError::InvalidUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut()
            .clear()
            .append_pair("v", &API_VERSION.to_string())
            .append_pair("encoding", "json");
        Ok(url.into())
    }

    /// Fetch the gateway url, retrying transient failures; `None` when shut down meanwhile
    async fn resolve_gateway_url(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> GatewayResult<Option<String>> {
        let mut attempt: u32 = 0;
        loop {
            match self.provider.fetch_gateway_url().await {
                Ok(info) => {
                    tracing::debug!(url = %info.url, shards = info.shards, "Gateway url resolved");
                    return Ok(Some(info.url));
                }
                Err(e) if e.is_retryable() => {
                    attempt = attempt.saturating_add(1);
                    let delay = self.config.backoff(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Gateway url lookup failed, retrying"
                    );
                    if sleep_or_shutdown(delay, shutdown_rx).await {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drive one socket until it ends; reports whether HELLO was received
    async fn run_connection(
        &self,
        socket: Socket,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> (ConnectionOutcome, bool) {
        let (mut sink, mut stream) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER_SIZE);
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel::<ShardSignal>();
        let shard_id = self.id;

        let mut writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                match frame {
                    OutboundFrame::Payload(message) => {
                        let json = match message.to_json() {
                            Ok(json) => json,
                            Err(e) => {
                                tracing::warn!(shard_id, error = %e, "Failed to encode frame");
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(json)).await {
                            tracing::warn!(shard_id, error = %e, "Failed to write to gateway socket");
                            break;
                        }
                    }
                    OutboundFrame::Close(code) => {
                        let frame = CloseFrame {
                            code: WsCloseCode::from(code),
                            reason: Cow::Borrowed(""),
                        };
                        let _ = sink.send(Message::Close(Some(frame))).await;
                        break;
                    }
                }
            }
            let _ = sink.close().await;
        });

        let handshake = Handshake {
            shard_id,
            config: self.config.clone(),
            session: self.session.clone(),
            outbound: outbound_tx.clone(),
            status: self.status.clone(),
            debug: self.debug.clone(),
        };
        let mut conn = ConnectionContext::new(handshake, self.pipeline.clone(), signal_tx);

        let outcome = loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(outcome) = self.handle_text(&mut conn, &text).await {
                            break outcome;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        self.report_decode_failure(&DecodeError::Binary);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break self.close_outcome(frame.as_ref());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Gateway socket error");
                        self.debug.emit(
                            DebugTag::SocketError,
                            Some(serde_json::json!({ "error": e.to_string() })),
                        );
                        break ConnectionOutcome::Reconnect { resume: true };
                    }
                    None => {
                        tracing::info!("Gateway socket ended without a close frame");
                        break ConnectionOutcome::Reconnect { resume: true };
                    }
                },
                Some(signal) = signal_rx.recv() => match signal {
                    ShardSignal::Zombie => {
                        tracing::warn!("Zombie connection, forcing a resumable reconnect");
                        break ConnectionOutcome::Reconnect { resume: true };
                    }
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break ConnectionOutcome::Shutdown;
                    }
                }
            }
        };

        let hello_received = conn.hello_received;
        conn.teardown();
        drop(conn);

        let _ = outbound_tx.try_send(OutboundFrame::Close(outcome.close_code()));
        drop(outbound_tx);
        if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut writer).await.is_err() {
            tracing::debug!("Writer did not finish in time, aborting");
            writer.abort();
        }

        (outcome, hello_received)
    }

    /// Decode and route one text frame; returns an outcome when the connection must end
    async fn handle_text(
        &self,
        conn: &mut ConnectionContext,
        text: &str,
    ) -> Option<ConnectionOutcome> {
        let message = match GatewayMessage::from_json(text) {
            Ok(message) => message,
            Err(e) => {
                self.report_decode_failure(&e);
                return None;
            }
        };

        tracing::trace!(op = %message.op, t = ?message.t, s = ?message.s, "Frame received");
        self.debug.emit(
            DebugTag::MessageReceived,
            Some(serde_json::json!({
                "op": message.op.as_u8(),
                "t": message.t,
                "s": message.s,
            })),
        );

        if let Some(sequence) = message.s {
            self.session.lock().update_sequence(sequence);
        }

        match MessageDispatcher::dispatch(conn, message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let code = e.to_close_code();
                tracing::warn!(error = %e, close_code = code.as_u16(), "Handler error, reconnecting");
                let _ = conn
                    .handshake
                    .outbound
                    .try_send(OutboundFrame::Close(code.as_u16()));
                Some(ConnectionOutcome::Reconnect {
                    resume: code.should_reconnect(),
                })
            }
        }
    }

    fn report_decode_failure(&self, error: &DecodeError) {
        match error {
            DecodeError::UnknownOpcode(op) => {
                tracing::debug!(op, "Unknown op code, frame dropped");
                self.debug.emit(
                    DebugTag::UnknownOpcode,
                    Some(serde_json::json!({ "op": op })),
                );
            }
            _ => {
                tracing::warn!(error = %error, "Undecodable frame dropped");
                self.debug.emit(
                    DebugTag::DecodeFailure,
                    Some(serde_json::json!({ "error": error.to_string() })),
                );
            }
        }
    }

    fn close_outcome(&self, frame: Option<&CloseFrame<'_>>) -> ConnectionOutcome {
        let Some(frame) = frame else {
            tracing::info!("Gateway closed the socket without a code");
            return ConnectionOutcome::Reconnect { resume: true };
        };
        let code = u16::from(frame.code);
        tracing::info!(close_code = code, reason = %frame.reason, "Gateway closed the socket");

        match classify_close(code) {
            CloseClassification::Resumable => ConnectionOutcome::Reconnect { resume: true },
            CloseClassification::SessionExpired => ConnectionOutcome::Reconnect { resume: false },
            CloseClassification::Fatal => CloseCode::from_u16(code).map_or(
                ConnectionOutcome::Reconnect { resume: false },
                ConnectionOutcome::Fatal,
            ),
        }
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("id", &self.id)
            .field("state", &self.status.get())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Sleep for `delay`; returns true if shutdown was requested meanwhile
async fn sleep_or_shutdown(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => false,
        changed = shutdown_rx.changed() => changed.is_err() || *shutdown_rx.borrow(),
    }
}
