//! Main entry point for the Arena Ladder service
//!
//! Initializes configuration, logging and the application state, then runs
//! until a shutdown signal arrives.

use anyhow::Result;
use arena_ladder::config::AppConfig;
use arena_ladder::service::AppState;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};

/// Arena Ladder - competitive-ladder matchmaking service
#[derive(Parser)]
#[command(
    name = "arena-ladder",
    version,
    about = "A competitive-ladder matchmaking service for community game bots",
    long_about = "Arena Ladder pairs queued players by rating proximity, runs map-elimination \
                 drafts, drives submitted results through opponent or moderator confirmation \
                 before any rating moves, and coordinates single-elimination tournament \
                 brackets on the same match primitives."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// AMQP URL override
    #[arg(long, value_name = "URL", help = "Override AMQP connection URL")]
    amqp_url: Option<String>,

    /// Health/metrics port override
    #[arg(long, value_name = "PORT", help = "Override health endpoint port")]
    health_port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without starting service")]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(amqp_url) = &args.amqp_url {
        config.amqp.url = amqp_url.clone();
    }
    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    Ok(config)
}

fn display_startup_banner(config: &AppConfig) {
    info!("Arena Ladder service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!("   AMQP: {}", config.amqp.url);
    info!(
        "   Pairing interval: {}s",
        config.scheduler.pairing_interval_seconds
    );
    info!(
        "   Confirmation window: {}s",
        config.scheduler.confirmation_window_seconds
    );
    info!("   Match TTL: {}s", config.scheduler.match_ttl_seconds);
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Configuration validation successful");
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Arena Ladder service is running, press Ctrl+C to shut down");
    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown");
    let shutdown_timeout = config.shutdown_timeout();
    match tokio::time::timeout(shutdown_timeout, app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed"),
        Ok(Err(e)) => warn!("Shutdown finished with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Arena Ladder service stopped");
    Ok(())
}
