mod config;
mod console_view;
mod diagnostics;

use anyhow::{Context, Result};
use clap::Parser;
use console_view::{format_snapshot, ConsoleView};
use diagnostics::{handle_diagnostic_command, load_config, Cli};
use posture_monitor_core::{DetectionController, Document, HttpBackend, PageView, PostureBackend};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

type Controller = DetectionController<HttpBackend, ConsoleView>;

/// What a line typed into the session asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    Toggle,
    Snapshot,
    Quit,
    Unknown,
}

impl SessionCommand {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" | "t" | "toggle" => SessionCommand::Toggle,
            "s" | "status" => SessionCommand::Snapshot,
            "q" | "quit" | "exit" => SessionCommand::Quit,
            _ => SessionCommand::Unknown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        return handle_diagnostic_command(command, &cli).await;
    }

    diagnostics::init_logging(&cli).context("Failed to initialize logging")?;

    let config = load_config(&cli)?;
    info!("Configuration loaded");
    info!("Posture service: {}", config.backend.base_url);
    info!("Poll interval: {}ms", config.polling.interval_ms);

    let backend = config.http_backend()?;
    let document = Document::posture_page(&backend.placeholder_url());
    let page = PageView::bind(&document).context("Failed to bind page elements")?;
    let view = ConsoleView::new(page);
    let controller = DetectionController::new(backend, view, config.controller_config());

    if cli.autostart {
        controller.start_detection().await;
    }

    println!("Enter (or t) toggles detection, s shows the page, q quits");
    let session = run_session(&controller).await;

    shutdown(&controller, config.release.timeout()).await;
    println!("Session: {}", controller.view().stats());
    session
}

/// Forward stdin lines from a dedicated thread
///
/// Lives on its own OS thread so a pending read never holds up shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(8);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Read commands from stdin until quit, EOF or Ctrl-C
async fn run_session(controller: &Controller) -> Result<()> {
    let mut lines = spawn_stdin_reader();

    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(line) = line.transpose().context("Failed to read stdin")? else {
                    info!("Input closed");
                    return Ok(());
                };

                match SessionCommand::parse(&line) {
                    SessionCommand::Toggle => controller.toggle().await,
                    SessionCommand::Snapshot => {
                        println!("{}", format_snapshot(&controller.view().snapshot()));
                    }
                    SessionCommand::Quit => return Ok(()),
                    SessionCommand::Unknown => {
                        println!("Unknown command '{}'", line.trim());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received interrupt");
                return Ok(());
            }
        }
    }
}

/// Unload the page and give the camera release a bounded chance to finish
async fn shutdown(controller: &Controller, timeout: Duration) {
    let Some(release) = controller.unload() else {
        return;
    };

    match tokio::time::timeout(timeout, release).await {
        Ok(Ok(())) => info!("Camera release finished"),
        Ok(Err(e)) => warn!("Camera release task failed: {}", e),
        Err(_) => warn!("Camera release still pending after {:?}", timeout),
    }
}
