//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::Intents;
use crate::infrastructure::gateway::CompressionMode;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Bot credentials and identity
    pub bot: BotSettings,

    /// Gateway connection configuration
    pub gateway: GatewaySettings,

    /// Heartbeat configuration
    pub heartbeat: HeartbeatSettings,

    /// Reconnect backoff configuration
    pub reconnect: ReconnectSettings,

    /// HTTP API configuration
    pub rest: RestSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Bot credentials and identity.
#[derive(Debug, Clone, Deserialize)]
pub struct BotSettings {
    /// Bot token
    pub token: String,

    /// Intents: "standard", "all", an integer, or names joined with `|`
    pub intents: String,

    /// Client name reported in IDENTIFY properties
    pub client_name: String,
}

/// Gateway connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Gateway base URL
    pub url: String,

    /// Gateway protocol version
    pub version: u8,

    /// Transport compression: "zlib-stream", "payload" or "none"
    pub compression: CompressionMode,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatSettings {
    /// Fraction of the interval to wait before the first beat, in (0, 1)
    pub jitter: f64,

    /// Unacknowledged beats before reconnecting (0 disables the watchdog)
    pub max_missed_acks: u32,
}

/// Reconnect backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    /// Base delay in milliseconds
    pub backoff_base_ms: u64,

    /// Maximum delay in milliseconds
    pub backoff_max_ms: u64,

    /// Consecutive failed attempts before giving up (0 = unlimited)
    pub max_attempts: u32,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RestSettings {
    /// API base URL (the version is appended)
    pub base_url: String,

    /// API version
    pub version: u8,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Check the token with `GET /users/@me` before connecting
    pub verify_token: bool,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        // Determine the running environment
        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Self::builder(&environment)?
            // Load from config files
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Load from environment variables
            // APP__GATEWAY__VERSION=10 -> gateway.version = 10
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            // Map simple environment variables
            .set_override_option("bot.token", std::env::var("BOT_TOKEN").ok())?
            .set_override_option("bot.intents", std::env::var("BOT_INTENTS").ok())?
            .set_override_option("gateway.url", std::env::var("GATEWAY_URL").ok())?
            .build()?
            .try_deserialize()
            .and_then(Self::validate)
    }

    /// Defaults for every setting except the token.
    fn builder(
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", environment)?
            .set_default("bot.token", "")?
            .set_default("bot.intents", "standard")?
            .set_default("bot.client_name", env!("CARGO_PKG_NAME"))?
            .set_default("gateway.url", "wss://gateway.discord.gg")?
            .set_default("gateway.version", 10)?
            .set_default("gateway.compression", "zlib-stream")?
            .set_default("heartbeat.jitter", 0.5)?
            .set_default("heartbeat.max_missed_acks", 2)?
            .set_default("reconnect.backoff_base_ms", 1000_i64)?
            .set_default("reconnect.backoff_max_ms", 60000_i64)?
            .set_default("reconnect.max_attempts", 0)?
            .set_default("rest.base_url", "https://discord.com/api")?
            .set_default("rest.version", 10)?
            .set_default("rest.timeout_secs", 30)?
            .set_default("rest.verify_token", true)
    }

    fn validate(settings: Self) -> Result<Self, ConfigError> {
        if settings.bot.token.trim().is_empty() {
            return Err(ConfigError::Message(
                "Bot token is required (set BOT_TOKEN or bot.token)".into(),
            ));
        }

        let jitter = settings.heartbeat.jitter;
        if !(jitter > 0.0 && jitter < 1.0) {
            return Err(ConfigError::Message(format!(
                "Heartbeat jitter must be between 0 and 1 (exclusive). Current value: {}",
                jitter
            )));
        }

        settings.intents()?;
        Ok(settings)
    }

    /// Parsed intents bitfield.
    pub fn intents(&self) -> Result<Intents, ConfigError> {
        self.bot.intents.parse().map_err(ConfigError::Message)
    }
}
