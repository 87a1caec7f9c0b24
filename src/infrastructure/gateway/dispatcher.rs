//! Protocol Dispatcher
//!
//! Interprets decoded payloads by opcode. Mutates the session, queues
//! IDENTIFY/RESUME/HEARTBEAT frames and forwards DISPATCH events to the
//! sink. Socket lifetime decisions are returned to the supervisor as a
//! `DispatchAction`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use super::connection::Outbound;
use super::heartbeat::HeartbeatMonitor;
use super::messages::{
    GatewayReceive, GatewaySend, HelloPayload, IdentifyPayload, OpCode, ReadyPayload,
    ResumePayload,
};
use super::session::{ConnectionPhase, SessionState};
use crate::domain::EventSink;
use crate::infrastructure::metrics;
use crate::shared::error::GatewayError;

/// What the supervisor should do after a payload was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    Continue,
    /// HELLO arrived; (re)start the heartbeat loop.
    StartHeartbeat { interval_ms: u64 },
    /// READY or RESUMED arrived; the session is live.
    Established,
    /// Drop this socket and connect again.
    Reconnect { resume: bool },
}

pub struct Dispatcher {
    identify: IdentifyPayload,
    sink: Arc<dyn EventSink>,
    monitor: Arc<HeartbeatMonitor>,
}

impl Dispatcher {
    pub fn new(
        identify: IdentifyPayload,
        sink: Arc<dyn EventSink>,
        monitor: Arc<HeartbeatMonitor>,
    ) -> Self {
        Self {
            identify,
            sink,
            monitor,
        }
    }

    /// Handle one decoded payload.
    pub fn handle(
        &mut self,
        session: &mut SessionState,
        payload: GatewayReceive,
        outbound: &mpsc::UnboundedSender<Outbound>,
    ) -> Result<DispatchAction, GatewayError> {
        let Some(op) = payload.opcode() else {
            tracing::debug!(op = payload.op, "Ignoring unknown opcode");
            return Ok(DispatchAction::Continue);
        };

        match op {
            OpCode::Hello => self.on_hello(session, payload.d, outbound),
            OpCode::Dispatch => self.on_dispatch(session, payload),
            OpCode::HeartbeatAck => {
                if let Some(latency) = self.monitor.ack_received() {
                    metrics::record_heartbeat_latency(latency.as_secs_f64());
                    tracing::trace!(latency_ms = latency.as_millis() as u64, "Heartbeat ACK");
                }
                Ok(DispatchAction::Continue)
            }
            OpCode::Heartbeat => {
                tracing::debug!("Server requested an immediate heartbeat");
                send(outbound, GatewaySend::heartbeat(session.sequence()))?;
                Ok(DispatchAction::Continue)
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                Ok(DispatchAction::Reconnect { resume: true })
            }
            OpCode::InvalidSession => {
                let resumable = payload.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                tracing::info!(resumable = resumable, "Invalid session");
                if !resumable {
                    session.clear_session();
                }
                Ok(DispatchAction::Reconnect { resume: resumable })
            }
            _ => {
                tracing::debug!(op = payload.op, "Ignoring client-bound opcode");
                Ok(DispatchAction::Continue)
            }
        }
    }

    fn on_hello(
        &mut self,
        session: &mut SessionState,
        data: Option<Value>,
        outbound: &mpsc::UnboundedSender<Outbound>,
    ) -> Result<DispatchAction, GatewayError> {
        let hello: HelloPayload = data
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| GatewayError::Protocol("HELLO without data".into()))?;
        session.set_heartbeat_interval(hello.heartbeat_interval);

        let resume = session.session_id().map(str::to_owned).zip(session.sequence());
        match resume {
            Some((session_id, seq)) => {
                tracing::info!(session_id = %session_id, seq = seq, "Resuming session");
                let frame = GatewaySend::resume(&ResumePayload {
                    token: self.identify.token.clone(),
                    session_id,
                    seq,
                })?;
                session.set_phase(ConnectionPhase::Resuming);
                send(outbound, frame)?;
            }
            None => {
                tracing::info!(intents = self.identify.intents, "Identifying");
                session.set_phase(ConnectionPhase::Identifying);
                send(outbound, GatewaySend::identify(&self.identify)?)?;
            }
        }

        Ok(DispatchAction::StartHeartbeat {
            interval_ms: hello.heartbeat_interval,
        })
    }

    fn on_dispatch(
        &mut self,
        session: &mut SessionState,
        payload: GatewayReceive,
    ) -> Result<DispatchAction, GatewayError> {
        if let Some(seq) = payload.s {
            session.observe_sequence(seq);
        }

        let name = payload.t.unwrap_or_default();
        let data = payload.d.unwrap_or(Value::Null);

        let action = match name.as_str() {
            "READY" => {
                let ready: ReadyPayload = serde_json::from_value(data.clone())?;
                let user = ready.user.as_ref();
                tracing::info!(
                    session_id = %ready.session_id,
                    user_id = %user.and_then(|u| u["id"].as_str()).unwrap_or_default(),
                    username = %user.and_then(|u| u["username"].as_str()).unwrap_or_default(),
                    "Session ready"
                );
                session.establish(ready.session_id, ready.resume_gateway_url);
                session.set_phase(ConnectionPhase::Ready);
                DispatchAction::Established
            }
            "RESUMED" => {
                tracing::info!(seq = ?session.sequence(), "Session resumed");
                session.set_phase(ConnectionPhase::Ready);
                DispatchAction::Established
            }
            _ => DispatchAction::Continue,
        };

        tracing::trace!(event = %name, seq = ?payload.s, "Dispatch");
        self.sink.emit(&name, data);
        Ok(action)
    }
}

fn send(outbound: &mpsc::UnboundedSender<Outbound>, frame: GatewaySend) -> Result<(), GatewayError> {
    outbound
        .send(Outbound::Frame(frame))
        .map_err(|_| GatewayError::NotConnected)
}
