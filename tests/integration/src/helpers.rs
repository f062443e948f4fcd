//! Test helpers for integration tests
//!
//! Provides a mock gateway served by axum on an ephemeral port. Every accepted socket is handed
//! to the test as a [`MockConnection`] that scripts server frames and captures client frames.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How long helpers wait for the client before failing the test
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

enum ServerFrame {
    Text(String),
    Close(u16),
}

/// A frame written by the client under test
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Payload(Value),
    Close(Option<u16>),
}

#[derive(Clone)]
struct MockState {
    connections: mpsc::UnboundedSender<MockConnection>,
    auto_ack: bool,
}

/// In-process gateway
pub struct MockGateway {
    addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a gateway that answers every heartbeat with an ACK
    pub async fn start() -> Result<Self> {
        Self::start_with(true).await
    }

    /// Start a gateway that forwards heartbeats to the test and never acknowledges them
    pub async fn start_silent() -> Result<Self> {
        Self::start_with(false).await
    }

    async fn start_with(auto_ack: bool) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = MockState {
            connections: tx,
            auto_ack,
        };
        let app = Router::new()
            .route("/gateway", get(gateway_handler))
            .with_state(state);

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            connections: rx,
            _handle: handle,
        })
    }

    /// Socket url of the gateway
    pub fn url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Wait for the client to open the next socket
    pub async fn accept(&mut self) -> Result<MockConnection> {
        tokio::time::timeout(RECV_TIMEOUT, self.connections.recv())
            .await
            .context("timed out waiting for a connection")?
            .context("mock gateway stopped")
    }
}

async fn gateway_handler(
    State(state): State<MockState>,
    RawQuery(query): RawQuery,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(state, socket, query))
}

async fn serve_socket(state: MockState, socket: WebSocket, query: Option<String>) {
    let (to_client_tx, mut to_client_rx) = mpsc::unbounded_channel();
    let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();

    let connection = MockConnection {
        query,
        to_client: to_client_tx,
        from_client: from_client_rx,
    };
    if state.connections.send(connection).is_err() {
        return;
    }

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = to_client_rx.recv() => match frame {
                Some(ServerFrame::Text(text)) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(ServerFrame::Close(code)) => {
                    let frame = CloseFrame { code, reason: Cow::Borrowed("") };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => break,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(value) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    if state.auto_ack && value["op"] == 1 {
                        let ack = json!({ "op": 11, "d": null }).to_string();
                        if sink.send(Message::Text(ack)).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    let _ = from_client_tx.send(ClientFrame::Payload(value));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = from_client_tx.send(ClientFrame::Close(frame.map(|f| f.code)));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            }
        }
    }
}

/// One client socket as seen by the gateway
pub struct MockConnection {
    /// Query string the client connected with
    pub query: Option<String>,
    to_client: mpsc::UnboundedSender<ServerFrame>,
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
}

impl MockConnection {
    /// Send a JSON frame to the client
    pub fn send(&self, frame: &Value) {
        let _ = self.to_client.send(ServerFrame::Text(frame.to_string()));
    }

    /// Send raw text, valid JSON or not
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(ServerFrame::Text(text.into()));
    }

    /// Close the socket with a code
    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(ServerFrame::Close(code));
    }

    /// Next frame from the client
    pub async fn recv(&mut self) -> Result<ClientFrame> {
        tokio::time::timeout(RECV_TIMEOUT, self.from_client.recv())
            .await
            .context("timed out waiting for a client frame")?
            .context("socket closed")
    }

    /// Next payload with this op code, skipping everything else
    pub async fn recv_op(&mut self, op: u8) -> Result<Value> {
        loop {
            match self.recv().await? {
                ClientFrame::Payload(value) if value["op"] == op => return Ok(value),
                ClientFrame::Payload(_) => {}
                ClientFrame::Close(code) => bail!("client closed with {code:?} while waiting for op {op}"),
            }
        }
    }

    /// Wait for the client's close frame, skipping payloads
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let ClientFrame::Close(code) = self.recv().await? {
                return Ok(code);
            }
        }
    }
}
