//! Prometheus exporter for ClustSafe rack PDUs.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use clustsafe_exporter::config::{LogFormat, Subcommand};
use clustsafe_exporter::{CommandFetcher, Credentials, ExporterConfig, HttpServer};

/// Prometheus exporter for ClustSafe rack PDUs.
#[derive(Parser, Debug)]
#[command(name = "clustsafe-exporter")]
#[command(about = "Export ClustSafe PDU readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Path under which to expose metrics (overrides config).
    #[arg(long)]
    telemetry_path: Option<String>,

    /// The ClustSafe command to use (overrides config).
    #[arg(long)]
    clustsafe_path: Option<String>,

    /// Report to request: clustsafes, sensors or all (overrides config).
    #[arg(long)]
    clustsafe_command: Option<Subcommand>,

    /// Log level (trace, debug, info, warn, error), overrides config.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // Override from CLI
    if let Some(listen) = args.listen {
        config.web.listen = listen;
    }
    if let Some(path) = args.telemetry_path {
        config.web.path = path;
    }
    if let Some(path) = args.clustsafe_path {
        config.clustsafe.path = path;
    }
    if let Some(command) = args.clustsafe_command {
        config.clustsafe.command = command;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    // Initialize logging
    let log_level = config.logging.level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("clustsafe_exporter={}", log_level).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting ClustSafe exporter");

    let credentials = Credentials::from_env().inspect_err(|e| error!("{}", e))?;

    info!(
        tool = %config.clustsafe.path,
        command = %config.clustsafe.command,
        timeout_secs = config.clustsafe.timeout_secs,
        user = %credentials.user,
        "Using ClustSafe command"
    );

    let listen_addr = config
        .web
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let fetcher = Arc::new(CommandFetcher::new(config.clustsafe.clone(), credentials));
    let http_server = HttpServer::new(fetcher, listen_addr, config.web.path.clone());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
