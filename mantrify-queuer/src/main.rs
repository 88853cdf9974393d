//! mantrify-queuer - Meditation audio job service
//!
//! Accepts meditation scripts over HTTP, queues them as durable jobs, and
//! runs each job through the text-to-speech and concatenation engines one
//! at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mantrify_common::config::{default_config_path, resolve_relative, resolve_root_folder, ROOT_FOLDER_ENV};
use mantrify_queuer::config::{LoggingConfig, QueuerConfig};
use mantrify_queuer::AppState;

/// Command-line arguments for mantrify-queuer
#[derive(Parser, Debug)]
#[command(name = "mantrify-queuer")]
#[command(about = "Meditation audio job queuer")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "MANTRIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder for the database and generated files
    #[arg(short, long, env = "MANTRIFY_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "MANTRIFY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Step 1: Load configuration (CLI path, then default locations)
    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path("mantrify-queuer"));
    let mut config = QueuerConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Step 2: Resolve root folder (CLI → ENV → TOML → default)
    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        ROOT_FOLDER_ENV,
        config.paths.root_folder.as_deref(),
    );
    config.paths.resolve_against(&root_folder);
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_tracing(&config.logging, &root_folder)?;

    info!("Starting mantrify-queuer");
    info!(
        "Version: {} (git {}, built {}, {} profile)",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Root folder: {}", root_folder.display());

    config.validate().context("Invalid configuration")?;

    // Step 3: Create working directories
    for dir in [
        &root_folder,
        &config.paths.queuer_dir,
        &config.paths.user_request_dir(),
        &config.paths.tts_csv_dir,
        &config.paths.concat_csv_dir,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    // Step 4: Open or create database
    info!("Database: {}", config.paths.database.display());
    let db_pool = mantrify_queuer::db::init_database(&config.paths.database)
        .await
        .context("Failed to initialize database")?;

    // Step 5: Fail jobs a previous process left mid-pipeline
    let interrupted = mantrify_queuer::db::jobs::fail_interrupted_jobs(&db_pool).await?;
    if interrupted > 0 {
        warn!("Marked {} interrupted job(s) as failed", interrupted);
    }

    let config = Arc::new(config);
    let state = AppState::new(db_pool, config.clone());

    // Step 6: Start the job worker (resumes any still-queued jobs)
    let cancel_token = CancellationToken::new();
    let worker = state.job_worker();
    let worker_handle = tokio::spawn(worker.run(cancel_token.clone()));

    let app = mantrify_queuer::build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // A running job finishes before the worker observes cancellation
    cancel_token.cancel();
    info!("Waiting for job worker to stop");
    if let Err(e) = worker_handle.await {
        warn!("Job worker ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing: `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig, root_folder: &std::path::Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", logging.level)));

    match &logging.file {
        Some(file) => {
            let path = resolve_relative(root_folder, file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
