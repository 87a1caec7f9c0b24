//! Common Test Utilities
//!
//! In-process mock gateway and REST API built on axum, plus helpers to
//! drive a `GatewayClient` against them.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use flate2::{Compress, Compression, FlushCompress};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use chat_client::application::{BusMessage, EventBus};
use chat_client::domain::Intents;
use chat_client::infrastructure::gateway::{
    CompressionMode, GatewayClient, GatewayConfig, GatewayHandle,
};
use chat_client::shared::error::GatewayError;

pub const TEST_TOKEN: &str = "test-token";

/// Upper bound for any single wait in a test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, failing the test if it takes longer than `STEP_TIMEOUT`.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(STEP_TIMEOUT, future)
        .await
        .expect("step timed out")
}

/// Frame as seen by the mock server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Json(Value),
    Closed(Option<u16>),
}

enum ServerFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(u16, String),
}

/// One accepted client socket
pub struct MockConnection {
    /// Raw query string of the upgrade request
    pub query: Option<String>,
    incoming: mpsc::UnboundedReceiver<ClientFrame>,
    outgoing: mpsc::UnboundedSender<ServerFrame>,
    compressor: Compress,
}

impl MockConnection {
    pub fn send_text(&self, text: &str) {
        let _ = self.outgoing.send(ServerFrame::Text(text.to_string()));
    }

    pub fn send_json(&self, value: Value) {
        self.send_text(&value.to_string());
    }

    /// Send `value` through the connection's zlib stream, split across `chunks` frames.
    pub fn send_compressed(&mut self, value: Value, chunks: usize) {
        let text = value.to_string();
        let mut compressed = Vec::with_capacity(text.len() + 1024);
        self.compressor
            .compress_vec(text.as_bytes(), &mut compressed, FlushCompress::Sync)
            .expect("compress");

        let size = compressed.len().div_ceil(chunks.max(1));
        for chunk in compressed.chunks(size.max(1)) {
            let _ = self.outgoing.send(ServerFrame::Binary(chunk.to_vec()));
        }
    }

    pub fn hello(&self, heartbeat_interval: u64) {
        self.send_json(json!({"op": 10, "d": {"heartbeat_interval": heartbeat_interval}}));
    }

    pub fn ready(&self, session_id: &str, seq: u64) {
        self.dispatch(seq, "READY", json!({"session_id": session_id, "user": {"id": "1"}}));
    }

    pub fn dispatch(&self, seq: u64, name: &str, data: Value) {
        self.send_json(json!({"op": 0, "s": seq, "t": name, "d": data}));
    }

    pub fn op(&self, op: u8, data: Value) {
        self.send_json(json!({"op": op, "d": data}));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.outgoing.send(ServerFrame::Close(code, reason.to_string()));
    }

    pub async fn recv(&mut self) -> ClientFrame {
        within(self.incoming.recv())
            .await
            .unwrap_or(ClientFrame::Closed(None))
    }

    /// Next JSON frame with opcode `op`; heartbeats are skipped unless asked for.
    pub async fn recv_op(&mut self, op: u64) -> Value {
        loop {
            match self.recv().await {
                ClientFrame::Json(frame) if frame["op"] == op => return frame,
                ClientFrame::Json(frame) if frame["op"] == 1 => continue,
                other => panic!("expected op {}, got {:?}", op, other),
            }
        }
    }

    /// Wait for the client's close frame, skipping anything sent before it.
    pub async fn recv_close(&mut self) -> Option<u16> {
        loop {
            if let ClientFrame::Closed(code) = self.recv().await {
                return code;
            }
        }
    }
}

#[derive(Clone)]
struct MockState {
    accepted: mpsc::UnboundedSender<MockConnection>,
}

/// Mock gateway and REST API on an ephemeral port
pub struct MockServer {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockServer {
    pub async fn start() -> Self {
        let (accepted, connections) = mpsc::unbounded_channel();
        let state = MockState { accepted };

        let router = Router::new()
            .route("/", get(upgrade))
            .route("/api/v10/users/@me", get(current_user))
            .route("/api/v10/channels/{channel_id}/messages", post(create_message))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, connections }
    }

    pub fn gateway_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub async fn accept(&mut self) -> MockConnection {
        within(self.connections.recv())
            .await
            .expect("mock server stopped")
    }

    /// Assert that no client connects within `wait`.
    pub async fn assert_no_connection(&mut self, wait: Duration) {
        if let Ok(Some(conn)) = tokio::time::timeout(wait, self.connections.recv()).await {
            panic!("unexpected connection (query {:?})", conn.query);
        }
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<MockState>,
    RawQuery(query): RawQuery,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state, query))
}

async fn serve_socket(socket: WebSocket, state: MockState, query: Option<String>) {
    let (mut sink, mut stream) = socket.split();
    let (incoming_tx, incoming) = mpsc::unbounded_channel();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel();

    let _ = state.accepted.send(MockConnection {
        query,
        incoming,
        outgoing,
        compressor: Compress::new(Compression::default(), true),
    });

    let writer = tokio::spawn(async move {
        while let Some(frame) = outgoing_rx.recv().await {
            let message = match frame {
                ServerFrame::Text(text) => Message::Text(text.into()),
                ServerFrame::Binary(bytes) => Message::Binary(bytes.into()),
                ServerFrame::Close(code, reason) => Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str(text.as_str()) {
                    let _ = incoming_tx.send(ClientFrame::Json(value));
                }
            }
            Message::Close(frame) => {
                let _ = incoming_tx.send(ClientFrame::Closed(frame.map(|f| f.code)));
                break;
            }
            _ => {}
        }
    }

    let _ = incoming_tx.send(ClientFrame::Closed(None));
    writer.abort();
}

async fn current_user(headers: HeaderMap) -> Response {
    let authorized = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bot {}", TEST_TOKEN))
        .unwrap_or(false);

    if authorized {
        Json(json!({"id": "1", "username": "test-bot", "bot": true})).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"message": "401: Unauthorized", "code": 0}"#).into_response()
    }
}

/// Echoes what kind of body arrived so tests can check JSON vs multipart.
async fn create_message(headers: HeaderMap, body: String) -> Json<Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    Json(json!({
        "content_type": content_type,
        "has_payload_json": body.contains(r#"name="payload_json""#),
        "has_file": body.contains(r#"name="files[0]""#),
        "body": if content_type.starts_with("application/json") {
            serde_json::from_str::<Value>(&body).unwrap_or(Value::Null)
        } else {
            Value::Null
        },
    }))
}

/// Gateway parameters for the mock server: no backoff, no watchdog.
pub fn gateway_config(url: String) -> GatewayConfig {
    GatewayConfig {
        url,
        version: 10,
        compression: CompressionMode::ZlibStream,
        token: TEST_TOKEN.to_string(),
        intents: Intents::standard(),
        client_name: "chat-client-tests".to_string(),
        heartbeat_jitter: 0.5,
        max_missed_acks: 0,
        backoff_base_ms: 0,
        backoff_max_ms: 0,
        max_reconnect_attempts: 0,
    }
}

/// A gateway client running on its own task
pub struct RunningClient {
    pub handle: GatewayHandle,
    pub events: broadcast::Receiver<BusMessage>,
    pub task: JoinHandle<Result<(), GatewayError>>,
}

impl RunningClient {
    pub fn spawn(config: GatewayConfig) -> Self {
        let bus = EventBus::new();
        let events = bus.subscribe();
        let mut client = GatewayClient::new(config, Arc::new(bus));
        let handle = client.handle();
        let task = tokio::spawn(async move { client.run().await });

        Self {
            handle,
            events,
            task,
        }
    }

    /// Name of the next dispatch on the bus, skipping error reports.
    pub async fn next_event(&mut self) -> (String, Value) {
        loop {
            match within(self.events.recv()).await.expect("event bus closed") {
                BusMessage::Dispatch(event) => return (event.name, event.data),
                BusMessage::Error(_) => continue,
            }
        }
    }

    /// Next error report code on the bus, skipping dispatches.
    pub async fn next_error_code(&mut self) -> u32 {
        loop {
            match within(self.events.recv()).await.expect("event bus closed") {
                BusMessage::Error(report) => return report.code,
                BusMessage::Dispatch(_) => continue,
            }
        }
    }

    /// Wait for `run` to return.
    pub async fn finish(self) -> Result<(), GatewayError> {
        within(self.task).await.expect("client task panicked")
    }
}
