//! `kaio gateway` — run the WebSocket gateway.

use anyhow::Context;
use kaio_config::AppConfig;

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::load().context("Failed to load config")?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!(
        "Starting gateway on {}:{} (provider: {})",
        config.gateway.host, config.gateway.port, config.active_provider
    );

    kaio_gateway::start(config).await.context("Gateway failed")
}
