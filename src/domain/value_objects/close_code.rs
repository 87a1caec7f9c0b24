//! Gateway close codes and the reconnect policy applied to them.

use std::fmt;

/// Normal closure; the peer is done with the connection.
pub const NORMAL_CLOSURE: u16 = 1000;
/// The peer is going away.
pub const GOING_AWAY: u16 = 1001;

/// Close code we send when we intend to resume the session afterwards.
/// Closing with 1000/1001 invalidates the session server-side.
pub const RESUME_CLOSE: u16 = 4000;

/// Documented gateway close codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CloseCode {
    UnknownError = 4000,
    UnknownOpcode = 4001,
    DecodeError = 4002,
    NotAuthenticated = 4003,
    AuthenticationFailed = 4004,
    AlreadyAuthenticated = 4005,
    InvalidSequence = 4007,
    RateLimited = 4008,
    SessionTimedOut = 4009,
    InvalidShard = 4010,
    ShardingRequired = 4011,
    InvalidApiVersion = 4012,
    InvalidIntents = 4013,
    DisallowedIntents = 4014,
}

impl CloseCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            4000 => Self::UnknownError,
            4001 => Self::UnknownOpcode,
            4002 => Self::DecodeError,
            4003 => Self::NotAuthenticated,
            4004 => Self::AuthenticationFailed,
            4005 => Self::AlreadyAuthenticated,
            4007 => Self::InvalidSequence,
            4008 => Self::RateLimited,
            4009 => Self::SessionTimedOut,
            4010 => Self::InvalidShard,
            4011 => Self::ShardingRequired,
            4012 => Self::InvalidApiVersion,
            4013 => Self::InvalidIntents,
            4014 => Self::DisallowedIntents,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human-readable description of the condition.
    pub fn description(self) -> &'static str {
        match self {
            Self::UnknownError => "Unknown error",
            Self::UnknownOpcode => "Unknown opcode",
            Self::DecodeError => "Decode error",
            Self::NotAuthenticated => "Not authenticated",
            Self::AuthenticationFailed => "Authentication failed",
            Self::AlreadyAuthenticated => "Already authenticated",
            Self::InvalidSequence => "Invalid sequence",
            Self::RateLimited => "Rate limited",
            Self::SessionTimedOut => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidApiVersion => "Invalid API version",
            Self::InvalidIntents => "Invalid intent(s)",
            Self::DisallowedIntents => "Disallowed intent(s)",
        }
    }

    /// Whether the session survives this close and can be resumed.
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            Self::UnknownError
                | Self::UnknownOpcode
                | Self::DecodeError
                | Self::NotAuthenticated
                | Self::AlreadyAuthenticated
                | Self::RateLimited
        )
    }

    /// Whether reconnecting cannot help (credentials or configuration are wrong).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidShard
                | Self::ShardingRequired
                | Self::InvalidApiVersion
                | Self::InvalidIntents
                | Self::DisallowedIntents
        )
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
    }
}

/// What the supervisor should do after the server closed the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Graceful shutdown; do not reconnect.
    Stop,
    /// Reconnect, resuming when `resume` is true.
    Reconnect { resume: bool },
    /// Reconnecting cannot succeed.
    Terminal,
}

/// Classify a close code. Only 1000 and 1001 count as graceful.
pub fn classify(code: u16) -> CloseDisposition {
    if matches!(code, NORMAL_CLOSURE | GOING_AWAY) {
        return CloseDisposition::Stop;
    }

    match CloseCode::from_u16(code) {
        Some(known) if known.is_terminal() => CloseDisposition::Terminal,
        Some(known) => CloseDisposition::Reconnect {
            resume: known.is_resumable(),
        },
        None => CloseDisposition::Reconnect { resume: false },
    }
}

/// Text used in errors when the server sent no reason.
pub fn describe(code: u16, reason: &str) -> String {
    match (CloseCode::from_u16(code), reason.is_empty()) {
        (Some(known), true) => known.description().to_string(),
        (Some(known), false) => format!("{}: {}", known.description(), reason),
        (None, true) => "Unknown close code".to_string(),
        (None, false) => reason.to_string(),
    }
}
