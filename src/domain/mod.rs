//! # Domain Layer
//!
//! Protocol-level types shared by the gateway engine and the application.
//! It is independent of any transport or runtime concerns.
//!
//! ## Structure
//!
//! - **value_objects**: Immutable value types (Intents, CloseCode)
//! - **events**: Dispatch events and the `EventSink` contract
//!
//! ## Design Principles
//!
//! - No dependencies on the infrastructure layer
//! - The engine talks to the application only through `EventSink`

pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use events::*;
pub use value_objects::*;
