//! WebSocket Connection
//!
//! Opens the gateway socket and runs the writer task. Everything sent to
//! the server goes through one unbounded channel so the receive loop and
//! the heartbeat loop never share the sink.

use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::messages::GatewaySend;
use crate::shared::error::GatewayError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsReader = SplitStream<WsStream>;
pub type WsWriter = SplitSink<WsStream, Message>;

/// Instruction for the writer task
#[derive(Debug)]
pub enum Outbound {
    Frame(GatewaySend),
    /// Send a close frame and stop writing.
    Close { code: u16, reason: String },
}

/// The socket currently owned by the supervisor.
///
/// Published through a watch cell; replacing it is a single atomic swap
/// that every reader observes.
#[derive(Debug, Clone)]
pub struct ActiveSocket {
    pub generation: u64,
    pub outbound: mpsc::UnboundedSender<Outbound>,
}

/// Open a socket to `url` and split it.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader), GatewayError> {
    let (stream, response) = connect_async(url).await?;
    tracing::debug!(status = %response.status(), "WebSocket handshake complete");
    Ok(stream.split())
}

/// Spawn the task that serializes outbound frames onto the socket.
pub fn spawn_writer(
    mut writer: WsWriter,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            let message = match outbound {
                Outbound::Frame(frame) => match frame.to_json() {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::error!(error = %e, op = frame.op, "Failed to serialize frame");
                        continue;
                    }
                },
                Outbound::Close { code, reason } => {
                    tracing::debug!(code = code, "Sending close frame");
                    let frame = CloseFrame {
                        code: WsCloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = writer.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Close frame not delivered");
                    }
                    break;
                }
            };

            if let Err(e) = writer.send(message).await {
                tracing::debug!(error = %e, "Writer task: send failed");
                break;
            }
        }
    })
}

/// Wait for the writer to flush, aborting it after `timeout`.
pub async fn finish_writer(mut handle: JoinHandle<()>, timeout: Duration) {
    tokio::select! {
        _ = &mut handle => {}
        _ = tokio::time::sleep(timeout) => {
            tracing::debug!("Writer did not finish in time, aborting");
            handle.abort();
        }
    }
}
