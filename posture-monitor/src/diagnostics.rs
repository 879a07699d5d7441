//! Command Line and Logging
//!
//! CLI definition, logging setup and the one-shot diagnostic commands that
//! talk to the posture service without starting a session.

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use posture_monitor_core::{MetricsDisplay, PostureBackend};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// Posture monitor command-line interface
#[derive(Parser, Debug)]
#[command(name = "posture-monitor")]
#[command(about = "Client for a posture-detection service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(short, long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Enable JSON structured logging
    #[arg(long)]
    pub json_logs: bool,

    /// Show timestamps in logs
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    pub timestamps: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start detection as soon as the session opens
    #[arg(long)]
    pub autostart: bool,

    /// Diagnostic subcommand
    #[command(subcommand)]
    pub command: Option<DiagnosticCommand>,
}

/// One-shot commands for checking the posture service
#[derive(Subcommand, Debug)]
pub enum DiagnosticCommand {
    /// Show version information
    Version,

    /// Show the effective configuration
    DumpConfig,

    /// Fetch and print posture samples
    Metrics {
        /// Number of samples
        #[arg(short, long, default_value = "5")]
        count: usize,

        /// Pause between samples in milliseconds
        #[arg(short, long, default_value = "200")]
        interval_ms: u64,
    },

    /// Ask the service to release the camera
    StopCamera,

    /// Ask the service to open the camera
    StartCamera,
}

/// Initialize logging based on CLI configuration
pub fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = cli.log_level.parse::<Level>().with_context(|| {
        format!(
            "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
            cli.log_level
        )
    })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.as_str()))
        .context("Failed to create log filter")?;

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    match (cli.json_logs, cli.timestamps) {
        (true, true) => subscriber.json().init(),
        (true, false) => subscriber.without_time().json().init(),
        (false, true) => subscriber.init(),
        (false, false) => subscriber.without_time().init(),
    }

    info!(
        "Logging initialized: level={}, json={}, timestamps={}",
        log_level, cli.json_logs, cli.timestamps
    );

    Ok(())
}

/// Load the configuration named on the command line, or the default one
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")
}

/// Run a diagnostic command
pub async fn handle_diagnostic_command(command: &DiagnosticCommand, cli: &Cli) -> Result<()> {
    match command {
        DiagnosticCommand::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            Ok(())
        }
        DiagnosticCommand::DumpConfig => {
            let config = load_config(cli)?;
            let contents =
                toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", contents);
            Ok(())
        }
        DiagnosticCommand::Metrics { count, interval_ms } => {
            let config = load_config(cli)?;
            let backend = config.http_backend()?;

            println!("\n=== Posture Samples ({}) ===", backend.endpoints().metrics_url());
            for i in 0..*count {
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(*interval_ms)).await;
                }
                match backend.fetch_metrics().await {
                    Ok(sample) => println!("{}", format_sample_line(&MetricsDisplay::from(&sample))),
                    Err(e) => {
                        warn!("Error polling metrics: {}", e);
                        println!("error: {}", e.user_message());
                    }
                }
            }
            Ok(())
        }
        DiagnosticCommand::StopCamera => {
            let config = load_config(cli)?;
            config
                .http_backend()?
                .stop_camera()
                .await
                .context("Camera release failed")?;
            println!("Camera released");
            Ok(())
        }
        DiagnosticCommand::StartCamera => {
            let config = load_config(cli)?;
            config
                .http_backend()?
                .start_camera()
                .await
                .context("Camera start failed")?;
            println!("Camera opened");
            Ok(())
        }
    }
}

/// One line per sample: `neck 12.3°  torso 5.0°  Bad`
pub fn format_sample_line(display: &MetricsDisplay) -> String {
    format!(
        "neck {:>7}  torso {:>7}  {}",
        display.neck_angle, display.torso_angle, display.posture_label
    )
}
