//! Winman - window positioning command server
//!
//! Listens on a local TCP port and applies setPosition/focus commands to the
//! windows of running applications.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use winman::backend::create_backend;
use winman::config::Config;
use winman::server::WindowServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::parse();

    tracing::info!("Starting winman");

    let backend = create_backend(config.backend).await?;
    let server = WindowServer::bind(&config, backend).await?;

    tracing::info!("winman ready, listening on {}", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("winman shutting down");
    Ok(())
}
