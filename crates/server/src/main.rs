use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use morpho_core::{
    load_config, validate_config, ArtifactStore, Config, ConversionExecutor, ConversionService,
    ConverterKind, DocumentConverter, FfmpegConverter, FsArtifactStore, ImageConverter,
    JobScheduler, JobStore, ProgressPublisher, RetentionSweeper, SqliteJobStore,
};

use morpho_server::api::create_router;
use morpho_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MORPHO_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; every section has defaults, so a missing file
    // just means a default deployment.
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file at {:?}, using defaults", config_path);
        Config::default()
    };

    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!("Storage root: {:?}", config.storage.root);

    // Create SQLite job store
    let store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    // Create filesystem artifact store
    let storage: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::new(config.storage.root.clone())
            .await
            .context("Failed to create artifact store")?,
    );
    info!("Artifact store initialized");

    // Register converter capabilities
    let executor = ConversionExecutor::new(Arc::clone(&storage), config.storage.work_dir.clone())
        .with_converter(
            ConverterKind::Image,
            Arc::new(ImageConverter::new(config.converter.clone())),
        )
        .with_converter(
            ConverterKind::Document,
            Arc::new(DocumentConverter::new(config.converter.clone())),
        )
        .with_converter(
            ConverterKind::Video,
            Arc::new(FfmpegConverter::new(config.converter.clone())),
        );

    // A missing tool is not fatal; jobs routed to that capability fail
    // individually with a clear error.
    for (kind, err) in executor.validate().await {
        warn!("{} capability not ready: {}", kind, err);
    }
    let executor = Arc::new(executor);

    // Progress fan-out
    let publisher = Arc::new(ProgressPublisher::default());

    // Scheduler and worker pool
    let scheduler = Arc::new(JobScheduler::new(
        config.scheduler.clone(),
        Arc::clone(&store),
        executor,
        Arc::clone(&publisher),
        Arc::clone(&storage),
    ));
    scheduler.start().await;
    info!("Job scheduler started");

    // Retention sweeper
    let sweeper = Arc::new(RetentionSweeper::new(
        config.retention.clone(),
        Arc::clone(&store),
        Arc::clone(&storage),
    ));
    sweeper.start();

    // Service facade
    let service = Arc::new(ConversionService::new(
        store,
        storage,
        Arc::clone(&scheduler),
        publisher,
        config.limits.clone(),
    ));

    // Create app state and router
    let state = Arc::new(AppState::new(
        config.clone(),
        service,
        Arc::clone(&scheduler),
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    sweeper.stop();
    scheduler.stop().await;
    info!("Scheduler stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
