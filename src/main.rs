mod channel;
mod config;
mod conn;
mod protocol;
mod router;
mod server;
mod state;

use anyhow::Result;
use clap::Parser;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::parse();

    if let Err(err) = server::run(config).await {
        error!("{err:#}");
        return Err(err);
    }

    Ok(())
}
