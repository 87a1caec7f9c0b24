//! # Chat Client
//!
//! Gateway client for a Discord-compatible chat service.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - REST client and token check
//! - Gateway connection

use anyhow::Result;
use tracing::info;

use chat_client::config::Settings;
use chat_client::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chat_client::telemetry::init_tracing();

    info!("Starting Chat Client...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        gateway = %settings.gateway.url,
        version = settings.gateway.version,
        compression = ?settings.gateway.compression,
        environment = %settings.environment,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Connecting to gateway");
    application.run_until_stopped().await?;

    info!("Chat Client stopped");
    Ok(())
}
