//! # Garden Server
//!
//! Runs the full service: MQTT ingestion, the ingestion worker and the
//! realtime WebSocket endpoint. Configuration comes from `config/garden.toml`,
//! `config/garden.<env>.toml` and `GARDEN__*` environment variables; set
//! `GARDEN_CONFIG_DIR` to read the files from elsewhere.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use garden_core::config::ConfigManager;
use garden_core::fanout;
use garden_core::logging::init_structured_logging;
use garden_core::messaging::MqttChannel;
use garden_core::system::{connect_gateway, GardenSystem};
use tracing::{error, info, warn};

const PUMP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config_dir = std::env::var("GARDEN_CONFIG_DIR").ok().map(PathBuf::from);
    let manager = ConfigManager::load_from_directory(config_dir).context("loading configuration")?;
    let config = manager.config().clone();
    info!(
        environment = %manager.environment(),
        config = %manager.debug_config(),
        "🌱 Starting garden server"
    );

    let gateway = connect_gateway(&config)
        .await
        .context("connecting persistence gateway")?;
    let (channel, pump) = MqttChannel::connect(&config.mqtt);
    let channel = Arc::new(channel);
    let system = GardenSystem::build(config.clone(), gateway, channel.clone())
        .context("building garden system")?;

    let (sink, worker) = system.start_ingestion();
    let mut pump_task = tokio::spawn(pump.run(sink));

    let bind_address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    info!(address = %bind_address, "Realtime endpoint listening");

    let app = fanout::router(Arc::new(system.hub().clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving realtime endpoint")?;

    info!("Shutting down");
    if let Err(e) = channel.disconnect().await {
        warn!(error = %e, "MQTT disconnect failed");
    }
    // The pump owns the last queue sender; once it stops the worker drains and exits
    match tokio::time::timeout(PUMP_SHUTDOWN_GRACE, &mut pump_task).await {
        Ok(Err(e)) => error!(error = %e, "MQTT pump task failed"),
        Ok(Ok(())) => {}
        Err(_) => {
            warn!("MQTT pump did not stop in time, aborting");
            pump_task.abort();
        }
    }
    if let Err(e) = worker.await {
        error!(error = %e, "Ingestion worker task failed");
    }

    info!(status = ?system.status(), "🛑 Garden server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}
