//! # Configuration Module
//!
//! This module handles application configuration loading and management.
//! Configuration can be loaded from:
//! - Environment variables (prefixed with APP__, plus BOT_TOKEN, BOT_INTENTS and GATEWAY_URL)
//! - Configuration files (config/default.toml, config/{environment}.toml)
//! - .env files (via dotenvy)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_client::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Connecting to {} (v{})", settings.gateway.url, settings.gateway.version);
//! ```

mod settings;

pub use settings::*;
