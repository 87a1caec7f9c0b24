//! # Domain Value Objects
//!
//! Immutable value types that represent protocol concepts without identity.
//!
//! ## Value Objects
//!
//! - **Intents**: 64-bit gateway intents bitfield with named presets
//! - **CloseCode**: gateway close codes and the reconnect policy for them

pub mod close_code;
mod intents;

pub use close_code::CloseCode;
pub use intents::*;
