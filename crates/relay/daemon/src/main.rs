//! Relay Daemon - procedure gateway with embedded worker pools
//!
//! The relay daemon provides:
//! - REST API for synchronous and future-based procedure calls
//! - Per-instance reply topic and pending-call correlation
//! - In-process worker pools hosting the built-in procedures

use clap::Parser;
use relay_daemon::config::DaemonConfig;
use relay_daemon::error::{DaemonError, DaemonResult};
use relay_daemon::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Relay Daemon CLI
#[derive(Parser)]
#[command(name = "relayd")]
#[command(about = "Relay Daemon - broker-backed procedure gateway", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "RELAY_LISTEN_ADDR")]
    listen: Option<String>,

    /// Gateway instance id
    #[arg(long, env = "RELAY_INSTANCE_ID")]
    instance_id: Option<String>,

    /// Call deadline in milliseconds
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_MS")]
    request_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, env = "RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "RELAY_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(instance_id) = cli.instance_id {
        config.gateway.instance_id = Some(instance_id);
    }
    if let Some(timeout) = cli.request_timeout_ms {
        config.gateway.request_timeout_ms = timeout;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
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

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        pools = config.workers.len(),
        "Starting relay daemon"
    );

    let server = Server::new(config).await?;
    server.run().await
}
