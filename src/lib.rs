//! # Chat Client Library
//!
//! This crate provides a client for a Discord-compatible chat service:
//! - Gateway WebSocket engine with zlib-stream decompression, heartbeats,
//!   resume and reconnect
//! - REST client for issuing commands
//! - Broadcast event bus for application handlers
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Intents and the event sink contract
//! - **Application Layer**: Event bus
//! - **Infrastructure Layer**: Gateway engine, HTTP client, metrics
//!
//! ## Module Structure
//!
//! ```text
//! chat_client/
//! +-- config/         Configuration management
//! +-- domain/         Value objects and the event sink trait
//! +-- application/    Event bus
//! +-- infrastructure/ Gateway engine, HTTP client, metrics
//! +-- shared/         Common utilities (errors)
//! ```

// Configuration module
pub mod config;

// Domain layer - Protocol types
pub mod domain;

// Application layer - Event delivery
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Application startup
pub mod startup;

// Telemetry and observability
pub mod telemetry;
