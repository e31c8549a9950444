//! Segment Cache host - boots a plugin host with its default cache client.

use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use segment_cache::config::Config;
use segment_cache::plugins::PluginHost;
use segment_cache::plugins::uptime::UptimePlugin;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("segment_cache=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting segment cache host...");

    let config = Config::from_env();
    info!("Configuration loaded successfully");
    info!("Default cache client: {}", config.default_client);

    let mut host = PluginHost::new(&config).await?;

    let uptime = UptimePlugin::new(Utc::now());
    host.register(&uptime).await?;

    match uptime.report().await {
        Ok(lookup) => info!("Uptime report: {:?}", lookup.value),
        Err(err) => warn!("Uptime report unavailable: {:#}", err),
    }

    info!("Host ready with plugins {:?}; press Ctrl-C to stop", host.plugins());
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    host.shutdown().await;

    Ok(())
}
