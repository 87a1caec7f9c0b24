//! Application Startup
//!
//! Builds the REST client, event bus and gateway client from settings and
//! runs the gateway until Ctrl-C or a terminal error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;

use crate::application::{BusMessage, EventBus};
use crate::config::Settings;
use crate::infrastructure::gateway::{GatewayClient, GatewayConfig, GatewayHandle};
use crate::infrastructure::http::HttpClient;
use crate::infrastructure::metrics;

/// Application instance
pub struct Application {
    settings: Arc<Settings>,
    rest: HttpClient,
    events: EventBus,
    gateway: GatewayClient,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let user_agent = format!(
            "DiscordBot ({}, {})",
            settings.bot.client_name,
            env!("CARGO_PKG_VERSION")
        );
        let rest = HttpClient::new(
            &settings.rest.base_url,
            settings.rest.version,
            &settings.bot.token,
            &user_agent,
            Duration::from_secs(settings.rest.timeout_secs),
        )?;

        if settings.rest.verify_token {
            let user = rest
                .current_user()
                .await
                .context("Failed to verify bot token")?;
            tracing::info!(
                user_id = %user["id"].as_str().unwrap_or_default(),
                username = %user["username"].as_str().unwrap_or_default(),
                "Bot token verified"
            );
        }

        let events = EventBus::new();
        let config = gateway_config(&settings)?;
        let gateway = GatewayClient::new(config, Arc::new(events.clone()));

        Ok(Self {
            settings: Arc::new(settings),
            rest,
            events,
            gateway,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// REST client for application code.
    pub fn rest(&self) -> &HttpClient {
        &self.rest
    }

    /// Event bus carrying every dispatch and error report.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn gateway_handle(&self) -> GatewayHandle {
        self.gateway.handle()
    }

    /// Gateway metrics in Prometheus text format.
    pub fn metrics(&self) -> String {
        metrics::gather_metrics()
    }

    /// Run the gateway until stopped
    pub async fn run_until_stopped(mut self) -> Result<()> {
        let handle = self.gateway.handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                handle.stop();
            }
        });

        let logger = tokio::spawn(log_events(self.events.clone()));

        let result = self.gateway.run().await;
        logger.abort();
        tracing::debug!(metrics = %self.metrics(), "Final gateway metrics");
        result?;
        Ok(())
    }
}

/// Map settings onto the gateway engine's parameters.
pub fn gateway_config(settings: &Settings) -> Result<GatewayConfig> {
    Ok(GatewayConfig {
        url: settings.gateway.url.clone(),
        version: settings.gateway.version,
        compression: settings.gateway.compression,
        token: settings.bot.token.clone(),
        intents: settings.intents()?,
        client_name: settings.bot.client_name.clone(),
        heartbeat_jitter: settings.heartbeat.jitter,
        max_missed_acks: settings.heartbeat.max_missed_acks,
        backoff_base_ms: settings.reconnect.backoff_base_ms,
        backoff_max_ms: settings.reconnect.backoff_max_ms,
        max_reconnect_attempts: settings.reconnect.max_attempts,
    })
}

async fn log_events(events: EventBus) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(BusMessage::Dispatch(event)) => {
                tracing::debug!(event = %event.name, "Gateway event");
            }
            Ok(BusMessage::Error(report)) => {
                tracing::warn!(code = report.code, kind = report.kind, message = %report.message, "Gateway error reported");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped = skipped, "Event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
