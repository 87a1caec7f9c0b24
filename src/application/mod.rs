//! Application Layer
//!
//! Wires gateway output to the application. The event bus is the
//! `EventSink` handed to the gateway engine.

pub mod event_bus;

pub use event_bus::{BusMessage, EventBus};
