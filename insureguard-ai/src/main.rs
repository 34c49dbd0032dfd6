//! insureguard-ai - claim fraud analysis service
//!
//! **Module Identity:**
//! - Name: insureguard-ai
//! - Default bind: 127.0.0.1:5780
//! - Default mode: independent (every provided modality is evaluated)
//!
//! Serves `POST /analyze` and `GET /health`, plus optional static front-end assets.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use insureguard_ai::collaborators::Collaborators;
use insureguard_ai::config::{ConfigOverrides, ServiceConfig};
use insureguard_ai::engine::FraudDecisionEngine;
use insureguard_ai::types::EvaluationMode;
use insureguard_ai::AppState;
use insureguard_common::config::{ensure_directory_exists, load_toml_config, locate_config_file};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "insureguard-ai")]
#[command(about = "Multimodal insurance claim fraud analysis service")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "IG_CONFIG")]
    config: Option<PathBuf>,

    /// Socket address to bind
    #[arg(short, long, env = "IG_BIND")]
    bind: Option<String>,

    /// Root directory for request-scoped uploads
    #[arg(long, env = "IG_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Evaluation mode: independent or gated
    #[arg(short, long, env = "IG_MODE")]
    mode: Option<EvaluationMode>,

    /// Directory of static front-end assets
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = locate_config_file(args.config.as_deref());
    let toml_config = load_toml_config(config_path.as_deref())?;

    insureguard_common::logging::init_tracing(&toml_config.logging.level);

    info!("Starting insureguard-ai (claim fraud analysis)");
    info!(
        "insureguard-ai v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("Config file: none (compiled defaults)"),
    }

    let overrides = ConfigOverrides {
        bind: args.bind,
        storage_root: args.storage_root,
        mode: args.mode,
        static_dir: args.static_dir,
    };
    let config = ServiceConfig::resolve(&toml_config, &overrides)
        .context("Invalid configuration")?;

    ensure_directory_exists(&config.storage_root)
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage root: {}", e))?;
    info!("Storage root: {}", config.storage_root.display());
    info!(
        mode = %config.mode,
        authentic_min = config.thresholds.authentic_min(),
        suspicious_min = config.thresholds.suspicious_min(),
        "Scoring policy loaded"
    );

    let collaborators = Collaborators::connect(&config).context("Collaborator setup failed")?;
    let engine = FraudDecisionEngine::new(&collaborators, &config.engine)
        .context("Decision engine setup failed")?;

    let state = AppState::from_config(Arc::new(engine), &config);
    if let Some(dir) = &state.static_dir {
        info!("Serving static assets from {}", dir.display());
    }

    let app = insureguard_ai::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("insureguard-ai stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
