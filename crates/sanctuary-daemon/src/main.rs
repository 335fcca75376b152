//! sanctuaryd - the Sanctuary identity/backup/trust service daemon.
//!
//! Binds the HTTP surface in `sanctuary-api` to whichever storage backend
//! is configured, and runs the `sanctuary-scheduler` background jobs
//! alongside it (§4.7, §6).

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::{DaemonError, DaemonResult};
use server::Server;

#[derive(Parser)]
#[command(name = "sanctuaryd")]
#[command(about = "Sanctuary daemon - persistent identity, backup and trust service", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SANCTUARY_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the config file and defaults
    #[arg(short, long, env = "SANCTUARY_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "SANCTUARY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "SANCTUARY_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config =
        DaemonConfig::load(cli.config.as_deref()).map_err(|e| DaemonError::Config(e.to_string()))?;

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("invalid listen address: {e}")))?;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        "starting sanctuary daemon"
    );

    let server = Server::new(config).await?;
    server.run().await
}
