//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Gateway WebSocket connection engine
//! - HTTP API client
//! - Prometheus metrics

pub mod gateway;
pub mod http;
pub mod metrics;
