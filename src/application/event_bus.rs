//! Event Bus
//!
//! Broadcast-backed `EventSink`. The gateway engine publishes every
//! DISPATCH and error report here; any number of application tasks can
//! subscribe and receive them in wire order.

use serde_json::Value;
use tokio::sync::broadcast;

use crate::domain::{DispatchEvent, EventSink};
use crate::infrastructure::metrics;
use crate::shared::error::ErrorReport;

const DEFAULT_CAPACITY: usize = 10000;

/// Message delivered to bus subscribers
#[derive(Debug, Clone)]
pub enum BusMessage {
    Dispatch(DispatchEvent),
    Error(ErrorReport),
}

/// Fan-out of gateway events to application subscribers
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to future events. Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, message: BusMessage) {
        // No subscribers is not an error: events are simply dropped.
        let _ = self.sender.send(message);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn emit(&self, name: &str, data: Value) {
        metrics::record_dispatch(name);
        self.publish(BusMessage::Dispatch(DispatchEvent {
            name: name.to_string(),
            data,
        }));
    }

    fn report_error(&self, report: &ErrorReport) {
        self.publish(BusMessage::Error(report.clone()));
    }
}
