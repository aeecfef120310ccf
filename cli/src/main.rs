//! Parkiraj reservation service, headless server binary.
//!
//! ```sh
//! # Default config (~/.config/parkiraj/config.toml)
//! parkiraj-service
//!
//! # Custom config and seed file
//! parkiraj-service --config /etc/parkiraj/config.toml --seed /etc/parkiraj/locations.json
//!
//! # Throwaway instance with no database
//! parkiraj-service --in-memory --seed locations.json
//!
//! # Validate config without starting
//! parkiraj-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use parkiraj::config::{AppConfig, CONFIG_ENV_VAR};
use parkiraj::server::{init_tracing, ServerHandle, ServerOptions};

#[derive(Parser, Debug)]
#[command(
    name = "parkiraj-service",
    version,
    about = "Parking spot reservation service",
    long_about = "Parkiraj: REST + WebSocket service that hands out parking spot \
                  reservations against a per-location capacity counter and \
                  releases them on cancel or expiry.\n\n\
                  Default config: ~/.config/parkiraj/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// JSON file of parking locations to seed on startup.
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Keep state in memory instead of SQLite.
    #[arg(long)]
    in_memory: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,

    /// Validate the configuration and exit without starting the server.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(parkiraj::default_config_path);

    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
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
        if let Some(e) = load_error {
            eprintln!("Invalid configuration in {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}", config.api_address());
        println!("   Database    : {}", config.database.connection_url());
        println!("   Log level   : {}", config.logging.level);
        println!(
            "   Reservations: default {}m, max {}m, sweep every {}s",
            config.reservations.default_duration_minutes,
            config.reservations.max_duration_minutes,
            config.reservations.sweep_interval_secs
        );
        return Ok(());
    }

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }
    if cli.api_port.is_some() || cli.log_level.is_some() {
        info!(api_port = ?cli.api_port, log_level = ?cli.log_level, "CLI overrides applied");
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
        in_memory: cli.in_memory,
        seed_path: cli.seed,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shut down gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
