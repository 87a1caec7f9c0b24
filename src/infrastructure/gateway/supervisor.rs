//! Connection Supervisor
//!
//! Owns the socket lifetime. `GatewayClient::run` connects, runs the
//! receive loop next to the heartbeat loop, and decides after every
//! disconnect whether to resume, reconnect from scratch, or stop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use super::backoff::Backoff;
use super::compression::{CompressionMode, FrameDecompressor};
use super::connection::{self, ActiveSocket, Outbound, WsReader};
use super::dispatcher::{DispatchAction, Dispatcher};
use super::heartbeat::{self, HeartbeatMonitor, HeartbeatTask};
use super::messages::{GatewayReceive, GatewaySend, IdentifyPayload, OpCode};
use super::session::{ConnectionPhase, SessionState};
use crate::domain::value_objects::close_code::{
    self, CloseCode, CloseDisposition, NORMAL_CLOSURE, RESUME_CLOSE,
};
use crate::domain::{EventSink, Intents};
use crate::infrastructure::metrics;
use crate::shared::error::GatewayError;

/// Time the writer gets to flush the close frame before it is aborted.
const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Close code recorded when the server closed without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Gateway connection parameters
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Gateway base URL, e.g. `wss://gateway.discord.gg`
    pub url: String,
    pub version: u8,
    pub compression: CompressionMode,
    pub token: String,
    pub intents: Intents,
    /// Sent as `$browser` and `$device` in IDENTIFY
    pub client_name: String,
    /// Fraction of the interval to wait before the first heartbeat, in (0, 1)
    pub heartbeat_jitter: f64,
    /// Unacknowledged heartbeats before the connection is dropped; 0 disables
    pub max_missed_acks: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Consecutive reconnects without a session before giving up; 0 is unlimited
    pub max_reconnect_attempts: u32,
}

impl GatewayConfig {
    /// URL for a connection attempt against `base`.
    pub fn connect_url(&self, base: &str) -> String {
        let mut url = format!(
            "{}/?v={}&encoding=json",
            base.trim_end_matches('/'),
            self.version
        );
        if let Some(compress) = self.compression.query_value() {
            url.push_str("&compress=");
            url.push_str(compress);
        }
        url
    }

    fn identify_payload(&self) -> IdentifyPayload {
        IdentifyPayload::new(
            &self.token,
            self.intents,
            &self.client_name,
            self.compression == CompressionMode::Payload,
        )
    }
}

/// How one physical connection ended
#[derive(Debug)]
enum LoopExit {
    /// Local stop or graceful server close.
    Stop,
    Reconnect {
        resume: bool,
        cause: Option<GatewayError>,
    },
    Fatal(GatewayError),
}

/// Cloneable control surface for a running `GatewayClient`.
#[derive(Clone)]
pub struct GatewayHandle {
    socket: watch::Receiver<Option<ActiveSocket>>,
    sequence: watch::Receiver<Option<u64>>,
    stop: Arc<watch::Sender<bool>>,
}

impl GatewayHandle {
    /// Send a command frame on the current socket.
    pub fn send(&self, op: OpCode, d: Value) -> Result<(), GatewayError> {
        if !op.is_command() {
            return Err(GatewayError::Protocol(format!(
                "opcode {} is not an application command",
                op as u8
            )));
        }

        let socket = self.socket.borrow().clone().ok_or(GatewayError::NotConnected)?;
        socket
            .outbound
            .send(Outbound::Frame(GatewaySend::command(op, d)))
            .map_err(|_| GatewayError::NotConnected)
    }

    /// Update the client's presence (op 3).
    pub fn update_presence(&self, presence: Value) -> Result<(), GatewayError> {
        self.send(OpCode::PresenceUpdate, presence)
    }

    /// Request member chunks for a guild (op 8).
    pub fn request_guild_members(
        &self,
        guild_id: &str,
        query: &str,
        limit: u32,
    ) -> Result<(), GatewayError> {
        self.send(
            OpCode::RequestGuildMembers,
            json!({"guild_id": guild_id, "query": query, "limit": limit}),
        )
    }

    /// Join, move between or leave (`channel_id = None`) voice channels (op 4).
    pub fn update_voice_state(
        &self,
        guild_id: &str,
        channel_id: Option<&str>,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<(), GatewayError> {
        self.send(
            OpCode::VoiceStateUpdate,
            json!({
                "guild_id": guild_id,
                "channel_id": channel_id,
                "self_mute": self_mute,
                "self_deaf": self_deaf,
            }),
        )
    }

    /// Ask the client to close the socket and return from `run`.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_connected(&self) -> bool {
        self.socket.borrow().is_some()
    }

    /// Last sequence number received.
    pub fn sequence(&self) -> Option<u64> {
        *self.sequence.borrow()
    }
}

/// A single logical gateway session, across any number of sockets.
pub struct GatewayClient {
    config: GatewayConfig,
    sink: Arc<dyn EventSink>,
    session: SessionState,
    dispatcher: Dispatcher,
    decompressor: FrameDecompressor,
    backoff: Backoff,
    monitor: Arc<HeartbeatMonitor>,
    socket_tx: watch::Sender<Option<ActiveSocket>>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    generation: u64,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, sink: Arc<dyn EventSink>) -> Self {
        let monitor = Arc::new(HeartbeatMonitor::new());
        let dispatcher = Dispatcher::new(config.identify_payload(), sink.clone(), monitor.clone());
        let (socket_tx, _) = watch::channel(None);
        let (stop_tx, stop_rx) = watch::channel(false);

        Self {
            decompressor: FrameDecompressor::new(config.compression),
            backoff: Backoff::new(config.backoff_base_ms, config.backoff_max_ms),
            config,
            sink,
            session: SessionState::new(),
            dispatcher,
            monitor,
            socket_tx,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            generation: 0,
        }
    }

    pub fn handle(&self) -> GatewayHandle {
        GatewayHandle {
            socket: self.socket_tx.subscribe(),
            sequence: self.session.subscribe_sequence(),
            stop: self.stop_tx.clone(),
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run until stopped locally, closed gracefully by the server, or a
    /// terminal error occurs. Transient failures are recovered here.
    pub async fn run(&mut self) -> Result<(), GatewayError> {
        loop {
            if *self.stop_rx.borrow() {
                self.session.set_phase(ConnectionPhase::Closing);
                return Ok(());
            }

            match self.run_connection().await {
                LoopExit::Stop => {
                    self.session.set_phase(ConnectionPhase::Closing);
                    tracing::info!("Gateway stopped");
                    return Ok(());
                }
                LoopExit::Fatal(err) => {
                    tracing::error!(error = %err, code = err.code(), "Gateway error is not recoverable");
                    self.sink.report_error(&err.report());
                    self.session.set_phase(ConnectionPhase::Closing);
                    return Err(err);
                }
                LoopExit::Reconnect { resume, cause } => {
                    if let Some(err) = cause {
                        tracing::warn!(error = %err, kind = err.kind(), code = err.code(), "Gateway connection lost");
                        self.sink.report_error(&err.report());
                    }
                    if !resume {
                        self.session.clear_session();
                    }
                    self.session.set_phase(ConnectionPhase::Disconnected);

                    let max = self.config.max_reconnect_attempts;
                    if max > 0 && self.backoff.attempt() >= max {
                        let err = GatewayError::ReconnectLimit(max);
                        tracing::error!(error = %err, "Giving up on the gateway");
                        self.sink.report_error(&err.report());
                        self.session.set_phase(ConnectionPhase::Closing);
                        return Err(err);
                    }

                    let resuming = self.session.can_resume();
                    metrics::record_reconnect(resuming);
                    let delay = self.backoff.next_delay();
                    tracing::info!(
                        resume = resuming,
                        attempt = self.backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting"
                    );

                    if self.sleep_or_stop(delay).await {
                        self.session.set_phase(ConnectionPhase::Closing);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Returns true when a stop was requested during the sleep.
    async fn sleep_or_stop(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = wait_for_stop(&mut self.stop_rx) => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// One physical connection: connect, loop, tear down.
    async fn run_connection(&mut self) -> LoopExit {
        self.session.begin_attempt();
        if self.decompressor.buffered_len() > 0 {
            tracing::debug!(
                bytes = self.decompressor.buffered_len(),
                "Discarding incomplete compressed message"
            );
        }
        self.decompressor.reset();
        self.monitor.reset();

        let base = match self.session.resume_gateway_url() {
            Some(resume_url) if self.session.can_resume() => resume_url.to_string(),
            _ => self.config.url.clone(),
        };
        let url = self.config.connect_url(&base);
        tracing::info!(url = %url, resume = self.session.can_resume(), "Connecting to gateway");

        let connected = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => return LoopExit::Stop,
            result = connection::connect(&url) => result,
        };
        // Dial failures leave the server-side session untouched.
        let (writer, mut reader) = match connected {
            Ok(halves) => halves,
            Err(err) => {
                return LoopExit::Reconnect {
                    resume: true,
                    cause: Some(err),
                }
            }
        };

        self.generation += 1;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let writer_handle = connection::spawn_writer(writer, outbound_rx);
        self.socket_tx.send_replace(Some(ActiveSocket {
            generation: self.generation,
            outbound: outbound_tx.clone(),
        }));
        self.session.set_phase(ConnectionPhase::AwaitingHello);

        let mut heartbeat_task = None;
        let exit = self
            .receive_loop(&mut reader, &outbound_tx, &mut heartbeat_task)
            .await;

        // Unpublish first so the heartbeat loop sees the swap before the socket closes.
        self.socket_tx.send_replace(None);
        if let Some(task) = heartbeat_task.take() {
            task.abort();
        }

        let (code, reason) = match &exit {
            LoopExit::Reconnect { resume: true, .. } => (RESUME_CLOSE, "resuming"),
            LoopExit::Reconnect { .. } => (NORMAL_CLOSURE, "reconnecting"),
            LoopExit::Stop | LoopExit::Fatal(_) => (NORMAL_CLOSURE, "closing"),
        };
        let _ = outbound_tx.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
        drop(outbound_tx);
        connection::finish_writer(writer_handle, WRITER_FLUSH_TIMEOUT).await;

        exit
    }

    async fn receive_loop(
        &mut self,
        reader: &mut WsReader,
        outbound: &mpsc::UnboundedSender<Outbound>,
        heartbeat_task: &mut Option<JoinHandle<()>>,
    ) -> LoopExit {
        let (zombie_tx, mut zombie_rx) = mpsc::unbounded_channel();

        loop {
            let message = tokio::select! {
                biased;

                _ = wait_for_stop(&mut self.stop_rx) => {
                    tracing::info!("Stop requested");
                    return LoopExit::Stop;
                }

                _ = zombie_rx.recv() => {
                    return LoopExit::Reconnect {
                        resume: true,
                        cause: Some(GatewayError::Transport(
                            "heartbeat acknowledgements stopped arriving".into(),
                        )),
                    };
                }

                message = reader.next() => message,
            };

            let text = match message {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(bytes))) => match self.decompressor.feed(&bytes) {
                    Ok(Some(text)) => text,
                    Ok(None) => continue,
                    Err(err) => return decode_failure(err),
                },
                Some(Ok(Message::Close(frame))) => return self.on_close(frame),
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    return LoopExit::Reconnect {
                        resume: false,
                        cause: Some(err.into()),
                    }
                }
                None => {
                    return LoopExit::Reconnect {
                        resume: false,
                        cause: Some(GatewayError::Transport("socket stream ended".into())),
                    }
                }
            };

            let payload = match GatewayReceive::from_json(&text) {
                Ok(payload) => payload,
                Err(err) => return decode_failure(err.into()),
            };

            match self.dispatcher.handle(&mut self.session, payload, outbound) {
                Ok(DispatchAction::Continue) => {}
                Ok(DispatchAction::StartHeartbeat { interval_ms }) => {
                    if let Some(previous) = heartbeat_task.take() {
                        previous.abort();
                    }
                    *heartbeat_task = Some(self.spawn_heartbeat(interval_ms, zombie_tx.clone()));
                }
                Ok(DispatchAction::Established) => self.backoff.reset(),
                Ok(DispatchAction::Reconnect { resume }) => {
                    return LoopExit::Reconnect {
                        resume,
                        cause: None,
                    }
                }
                Err(err) => return decode_failure(err),
            }
        }
    }

    fn spawn_heartbeat(&mut self, interval_ms: u64, zombie: mpsc::UnboundedSender<()>) -> JoinHandle<()> {
        let interval = Duration::from_millis(interval_ms);
        let first_delay = if self.session.claim_first_heartbeat() {
            heartbeat::jittered(interval, self.config.heartbeat_jitter)
        } else {
            interval
        };

        tokio::spawn(heartbeat::run_heartbeat(HeartbeatTask {
            interval,
            first_delay,
            generation: self.generation,
            max_missed_acks: self.config.max_missed_acks,
            sequence: self.session.subscribe_sequence(),
            socket: self.socket_tx.subscribe(),
            monitor: self.monitor.clone(),
            zombie,
        }))
    }

    fn on_close(&mut self, frame: Option<CloseFrame>) -> LoopExit {
        let (code, reason) = frame
            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
            .unwrap_or((NO_STATUS_RECEIVED, String::new()));
        let reason = close_code::describe(code, &reason);

        match close_code::classify(code) {
            CloseDisposition::Stop => {
                tracing::info!(code = code, reason = %reason, "Gateway closed the connection");
                LoopExit::Stop
            }
            CloseDisposition::Reconnect { resume } => LoopExit::Reconnect {
                resume,
                cause: Some(GatewayError::Closed { code, reason }),
            },
            CloseDisposition::Terminal if code == CloseCode::AuthenticationFailed.as_u16() => {
                LoopExit::Fatal(GatewayError::Auth(reason))
            }
            CloseDisposition::Terminal => LoopExit::Fatal(GatewayError::Closed { code, reason }),
        }
    }
}

/// Inflate state cannot be trusted after a failure, so the session is dropped too.
fn decode_failure(err: GatewayError) -> LoopExit {
    LoopExit::Reconnect {
        resume: false,
        cause: Some(err),
    }
}

/// Resolves once the stop flag is set.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}
