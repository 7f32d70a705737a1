// Vehicle Certificate Service - Web Server

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vehicle_certificate::{server, Config};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Vehicle Certificate Service v{}", vehicle_certificate::VERSION);

    let config = Config::load().context("Failed to load configuration")?;
    info!(
        primary = %config.primary_db.display(),
        secondary = %config.secondary_db.display(),
        "Using databases"
    );

    server::serve(config).await.context("Server failed")?;

    Ok(())
}
