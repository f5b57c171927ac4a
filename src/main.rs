//! nanoKONTROL OBS bridge
//!
//! Control OBS Studio and the system audio mixer from a KORG nanoKONTROL2.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use nanokontrol_obs::config::{self, AppConfig};
use nanokontrol_obs::controller::NanoKontrol;

const LOG_FILE_PREFIX: &str = "nanokontrol-obs.log";

/// Bridge a KORG nanoKONTROL2 to OBS Studio and the system audio mixer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: ./config.yaml, then the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Write log files as JSON lines
    #[arg(long)]
    log_json: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if args.list_ports {
        init_logging(&args.log_level, None, false)?;
        return list_ports();
    }

    let config_path = config::resolve_path(args.config.as_deref())?;
    let mut config = AppConfig::load(&config_path).await?;
    config.apply_env();

    let _guard = init_logging(&args.log_level, config.logging.directory.as_deref(), args.log_json)?;
    info!("Starting nanoKONTROL OBS bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path.display());

    nanokontrol_obs::app::run(config, shutdown_signal()).await?;

    info!("nanoKONTROL OBS bridge stopped");
    Ok(())
}

/// Console output plus optional daily log files
///
/// The returned guard flushes the file writer on drop.
fn init_logging(level: &str, directory: Option<&Path>, json: bool) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let (file, guard) = match directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            let layer = if json {
                layer.json().boxed()
            } else {
                layer.boxed()
            };
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}

fn list_ports() -> Result<()> {
    use colored::*;

    let (inputs, outputs) = NanoKontrol::list_ports()?;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    for (title, ports) in [("Input Ports:", inputs), ("Output Ports:", outputs)] {
        println!("\n{}", title.bold());
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for port in ports {
            let marker = if port.to_lowercase().contains("nano") {
                "[NANO]".green()
            } else {
                "      ".normal()
            };
            println!("  {} {}", marker, port);
        }
    }
    println!();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
