//! Stemdeck web service - main entry point
//!
//! Upload a song or video, split it into stems with Demucs, rebalance the
//! stems in the browser and export the remix onto the video with FFmpeg.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stemdeck_common::config::{
    load_toml_config, ConfigSource, RootFolderResolver, ServiceConfig, DEFAULT_PORT,
};
use stemdeck_web::{build_router, AppState};

const MODULE_NAME: &str = "stemdeck-web";

/// Default log filter when neither `RUST_LOG` nor `[logging] level` is set
const DEFAULT_LOG_FILTER: &str = "stemdeck_web=info,stemdeck_common=info,tower_http=info";

/// Command-line arguments for stemdeck-web
#[derive(Parser, Debug)]
#[command(name = "stemdeck-web")]
#[command(about = "Stem separation and remix web service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Root folder holding uploads, separated stems and exports
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = load_toml_config(MODULE_NAME, args.config.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    let default_filter = loaded
        .toml
        .logging
        .level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Stemdeck web service v{}", env!("CARGO_PKG_VERSION"));
    match &loaded.source {
        ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
        ConfigSource::Missing => warn!("No configuration file found, using defaults"),
    }

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder)
        .with_toml(&loaded.toml)
        .resolve();
    let root_folder = std::path::absolute(&root_folder)
        .with_context(|| format!("Invalid root folder: {}", root_folder.display()))?;
    let port = args.port.or(loaded.toml.port).unwrap_or(DEFAULT_PORT);

    let config = ServiceConfig::from_toml(root_folder, port, &loaded.toml)
        .context("Invalid configuration")?;
    info!("Root folder: {}", config.root_folder.display());

    let state = AppState::new(config);
    state
        .layout
        .ensure_directories()
        .context("Failed to create storage directories")?;

    probe_tools(&state).await;

    info!(
        max_upload_bytes = state.config.max_upload_bytes,
        max_export_duration_secs = state.config.max_export_duration_secs,
        separator_timeout_secs = state.config.separator_timeout.as_secs(),
        "Limits (export duration is advisory)"
    );

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Log whether the external tools can be started
///
/// Missing tools are not fatal: the affected requests fail with the tool's
/// own diagnostic.
async fn probe_tools(state: &AppState) {
    match state.transcoder.version().await {
        Some(version) => info!("FFmpeg: {}", version),
        None => warn!(
            "FFmpeg not available at '{}'; video processing and export will fail",
            state.config.ffmpeg_path
        ),
    }

    if state.separator.is_available().await {
        info!(
            "Separator available (model {}, timeout {}s)",
            state.separator.model(),
            state.separator.timeout().as_secs()
        );
    } else {
        warn!(
            "Separator '{} {}' not available; processing will fail",
            state.config.separator_program,
            state.config.separator_args.join(" ")
        );
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
