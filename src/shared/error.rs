//! Client Error Types
//!
//! Centralized error handling for the gateway engine and the REST client.

use serde::Serialize;

use crate::domain::CloseCode;

/// Gateway engine error type
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Gateway closed with code {code}: {reason}")]
    Closed { code: u16, reason: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Gave up after {0} reconnect attempts")]
    ReconnectLimit(u32),

    #[error("Gateway is not connected")]
    NotConnected,
}

impl GatewayError {
    /// Stable machine-readable kind for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Decode(_) => "decode",
            GatewayError::Closed { .. } => "gateway_close",
            GatewayError::Auth(_) => "auth",
            GatewayError::Transport(_) => "transport",
            GatewayError::Protocol(_) => "protocol",
            GatewayError::ReconnectLimit(_) => "reconnect_limit",
            GatewayError::NotConnected => "not_connected",
        }
    }

    /// Numeric code for the report body. Close errors carry the gateway close code.
    pub fn code(&self) -> u32 {
        match self {
            GatewayError::Closed { code, .. } => u32::from(*code),
            GatewayError::Auth(_) => u32::from(CloseCode::AuthenticationFailed.as_u16()),
            GatewayError::Decode(_) => 20001,
            GatewayError::Transport(_) => 20002,
            GatewayError::Protocol(_) => 20003,
            GatewayError::ReconnectLimit(_) => 20004,
            GatewayError::NotConnected => 20005,
        }
    }

    /// Build the structured report emitted before recovery.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            kind: self.kind(),
            message: self.to_string(),
            occurred_at: chrono::Utc::now(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Decode(err.to_string())
    }
}

/// REST client error type
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Error report body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: u32,
    pub kind: &'static str,
    pub message: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}
