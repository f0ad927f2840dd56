//! Server entrypoint: CLI parsing, logging, metrics, and lifecycle.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use matinee_server::{PresenceServer, metrics};
use matinee_settings::{MatineeSettings, load_settings, load_settings_from_path};

/// Presence server for synchronized screenings.
#[derive(Debug, Parser)]
#[command(name = "matinee", version, about)]
struct Cli {
    /// Listen host, overriding the settings file.
    #[arg(long)]
    host: Option<String>,

    /// Listen port, overriding the settings file.
    #[arg(long)]
    port: Option<u16>,

    /// Settings file to load instead of `~/.matinee/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut settings = load(cli.settings.as_deref())?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let recorder = metrics::install_recorder();
    info!(
        version = %settings.version,
        screening = %settings.screening.id,
        "starting matinee"
    );

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let handle = PresenceServer::new(settings)
        .with_metrics(recorder)
        .start(&host, port)
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    handle.shutdown().await;
    Ok(())
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load(path: Option<&Path>) -> anyhow::Result<MatineeSettings> {
    match path {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => load_settings().context("failed to load settings"),
    }
}
