//! Gateway Message Types
//!
//! Discord-compatible gateway message formats.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Intents;

/// Gateway opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    /// Event dispatch
    Dispatch = 0,
    /// Heartbeat
    Heartbeat = 1,
    /// Identify
    Identify = 2,
    /// Presence update
    PresenceUpdate = 3,
    /// Voice state update
    VoiceStateUpdate = 4,
    /// Resume
    Resume = 6,
    /// Reconnect
    Reconnect = 7,
    /// Request guild members
    RequestGuildMembers = 8,
    /// Invalid session
    InvalidSession = 9,
    /// Hello
    Hello = 10,
    /// Heartbeat ACK
    HeartbeatAck = 11,
}

impl OpCode {
    /// Map a wire value to an opcode. Unknown values yield `None`.
    pub fn from_u8(op: u8) -> Option<Self> {
        Some(match op {
            0 => Self::Dispatch,
            1 => Self::Heartbeat,
            2 => Self::Identify,
            3 => Self::PresenceUpdate,
            4 => Self::VoiceStateUpdate,
            6 => Self::Resume,
            7 => Self::Reconnect,
            8 => Self::RequestGuildMembers,
            9 => Self::InvalidSession,
            10 => Self::Hello,
            11 => Self::HeartbeatAck,
            _ => return None,
        })
    }

    /// Opcodes an application may send through the command channel.
    pub fn is_command(self) -> bool {
        matches!(
            self,
            Self::PresenceUpdate | Self::VoiceStateUpdate | Self::RequestGuildMembers
        )
    }
}

/// Incoming gateway message
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayReceive {
    pub op: u8,
    #[serde(default)]
    pub d: Option<Value>,
    #[serde(default)]
    pub s: Option<u64>,
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayReceive {
    /// Parse a decoded JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_u8(self.op)
    }
}

/// Outgoing gateway message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewaySend {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewaySend {
    fn with_data(op: OpCode, d: Value) -> Self {
        Self {
            op: op as u8,
            d: Some(d),
            s: None,
            t: None,
        }
    }

    /// Heartbeat (op 1). A missing sequence is sent as an explicit `null`.
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self::with_data(
            OpCode::Heartbeat,
            sequence.map(Value::from).unwrap_or(Value::Null),
        )
    }

    /// Identify (op 2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::with_data(OpCode::Identify, serde_json::to_value(payload)?))
    }

    /// Resume (op 6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::with_data(OpCode::Resume, serde_json::to_value(payload)?))
    }

    /// Application command (presence update, voice state update, guild member request).
    pub fn command(op: OpCode, d: Value) -> Self {
        Self::with_data(op, d)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Hello payload (op 10)
#[derive(Debug, Deserialize)]
pub struct HelloPayload {
    pub heartbeat_interval: u64,
}

/// Ready payload (dispatch READY)
#[derive(Debug, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

/// Identify payload (op 2)
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: u64,
    pub properties: IdentifyProperties,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub compress: bool,
}

impl IdentifyPayload {
    pub fn new(token: &str, intents: Intents, client_name: &str, compress: bool) -> Self {
        Self {
            token: token.to_string(),
            intents: intents.bits(),
            properties: IdentifyProperties {
                os: std::env::consts::OS.to_string(),
                browser: client_name.to_string(),
                device: client_name.to_string(),
            },
            compress,
        }
    }
}

/// Identify connection properties
#[derive(Debug, Clone, Serialize)]
pub struct IdentifyProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

/// Resume payload (op 6)
#[derive(Debug, Clone, Serialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}
