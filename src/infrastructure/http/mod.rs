//! HTTP API client used by application code to issue commands.

mod client;

pub use client::*;
