//! Gateway Session State
//!
//! The facts needed to resume a broken connection. Owned and mutated by the
//! receive loop; the current sequence is published through a watch channel
//! so the heartbeat task can read it without sharing this struct.

use std::fmt;

use tokio::sync::watch;

use crate::infrastructure::metrics;

/// Interval used until the server's HELLO provides the real one.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// Lifecycle phase of a gateway connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    AwaitingHello,
    Identifying,
    Resuming,
    Ready,
    Closing,
}

impl ConnectionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Ready => "ready",
            Self::Closing => "closing",
        }
    }

    /// Numeric value exported to the phase gauge.
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::AwaitingHello => 2,
            Self::Identifying => 3,
            Self::Resuming => 4,
            Self::Ready => 5,
            Self::Closing => 6,
        }
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Gateway session state
#[derive(Debug)]
pub struct SessionState {
    phase: ConnectionPhase,
    sequence: Option<u64>,
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    heartbeat_interval_ms: u64,
    first_heartbeat_sent: bool,
    sequence_tx: watch::Sender<Option<u64>>,
}

impl SessionState {
    pub fn new() -> Self {
        let (sequence_tx, _) = watch::channel(None);
        Self {
            phase: ConnectionPhase::Disconnected,
            sequence: None,
            session_id: None,
            resume_gateway_url: None,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            first_heartbeat_sent: false,
            sequence_tx,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: ConnectionPhase) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, "Connection phase changed");
            self.phase = phase;
            metrics::set_connection_phase(phase.ordinal());
        }
    }

    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn resume_gateway_url(&self) -> Option<&str> {
        self.resume_gateway_url.as_deref()
    }

    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    pub fn first_heartbeat_sent(&self) -> bool {
        self.first_heartbeat_sent
    }

    /// Receiver tracking the latest sequence number.
    pub fn subscribe_sequence(&self) -> watch::Receiver<Option<u64>> {
        self.sequence_tx.subscribe()
    }

    /// Reset per-connection facts at the start of a connection attempt.
    /// Session id and sequence survive so the attempt can resume.
    pub fn begin_attempt(&mut self) {
        self.heartbeat_interval_ms = DEFAULT_HEARTBEAT_INTERVAL_MS;
        self.first_heartbeat_sent = false;
        self.set_phase(ConnectionPhase::Connecting);
    }

    /// Record the `s` field of a DISPATCH. Sequences never move backwards.
    pub fn observe_sequence(&mut self, sequence: u64) {
        if let Some(current) = self.sequence {
            if sequence < current {
                tracing::warn!(
                    current = current,
                    received = sequence,
                    "Ignoring out-of-order sequence"
                );
                return;
            }
        }
        self.sequence = Some(sequence);
        self.sequence_tx.send_replace(self.sequence);
    }

    pub fn set_heartbeat_interval(&mut self, interval_ms: u64) {
        self.heartbeat_interval_ms = interval_ms;
    }

    /// Store the identifiers assigned by READY.
    pub fn establish(&mut self, session_id: String, resume_gateway_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_gateway_url = resume_gateway_url;
    }

    /// A resume needs both a session id and a sequence.
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.sequence.is_some()
    }

    /// Discard everything tied to the server-side session (full reconnect).
    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
        self.sequence = None;
        self.sequence_tx.send_replace(None);
    }

    /// Returns true exactly once per connection attempt: the caller applies jitter.
    pub fn claim_first_heartbeat(&mut self) -> bool {
        if self.first_heartbeat_sent {
            return false;
        }
        self.first_heartbeat_sent = true;
        true
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
