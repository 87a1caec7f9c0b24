//! Gateway Connection Engine
//!
//! Client side of the real-time event socket:
//! - `compression`: zlib-stream frame reassembly
//! - `heartbeat`: liveness loop with first-beat jitter
//! - `session`: resumable session facts and connection phase
//! - `dispatcher`: opcode handling
//! - `supervisor`: socket lifetime, reconnect and resume

pub mod backoff;
pub mod compression;
pub mod connection;
pub mod dispatcher;
pub mod heartbeat;
pub mod messages;
pub mod session;
pub mod supervisor;

pub use compression::CompressionMode;
pub use messages::OpCode;
pub use session::ConnectionPhase;
pub use supervisor::{GatewayClient, GatewayConfig, GatewayHandle};
