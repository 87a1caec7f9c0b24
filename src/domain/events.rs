//! Gateway event types and the sink contract.

use serde::Serialize;
use serde_json::Value;

use crate::shared::error::ErrorReport;

/// A DISPATCH forwarded to the application.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchEvent {
    /// Event name (the payload's `t` field), e.g. `MESSAGE_CREATE`
    pub name: String,
    /// Event data (the payload's `d` field)
    pub data: Value,
}

/// Receives events from the gateway engine.
///
/// Called from the receive loop in wire order. Implementations must not
/// block; hand work off to another task instead.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, data: Value);

    /// Called with a structured report before the engine recovers from a failure.
    fn report_error(&self, _report: &ErrorReport) {}
}
