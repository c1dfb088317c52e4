//! ParkeoYa: CLI Server
//!
//! Headless parking core suitable for deployment as a systemd service,
//! Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/parkeoya/config.toml)
//! parkeoya-service
//!
//! # Custom config path
//! parkeoya-service --config /etc/parkeoya/config.toml
//!
//! # Override the API port
//! parkeoya-service --api-port 8080
//!
//! # Validate config without starting
//! parkeoya-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use parkeoya::config::AppConfig;
use parkeoya::server::{init_tracing, ServerHandle, ServerOptions};

/// ParkeoYa: parking space allocation and reservations.
#[derive(Parser, Debug)]
#[command(
    name = "parkeoya-service",
    version,
    about = "Parking space allocation and reservation service",
    long_about = "ParkeoYa REST API server: parking lot registration, space \
                  layout, reservations and availability search.\n\n\
                  Default config: ~/.config/parkeoya/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "PARKEOYA_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(parkeoya::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) if cli.check => {
            eprintln!("Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(port) = cli.api_port {
        config.server.api_port = port;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        if let Err(e) = config.validate() {
            eprintln!("Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!(
            "   Database    : {}",
            config
                .database
                .connection_url()
                .unwrap_or_else(|| "in-memory".to_string())
        );
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());
    if cli.api_port.is_some() || cli.log_level.is_some() {
        info!(
            api_port = config.server.api_port,
            log_level = %config.logging.level,
            "CLI overrides applied"
        );
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
