use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showtunes_core::{
    create_providers, load_config, validate_config, DedupStore, FsSnapshotStorage, Schedulers,
    ShowSource, SnapshotStorage, SonarrClient, Sweeper, ThemeOrchestrator,
};

use showtunes_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
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

    info!("showtunes {}", VERSION);

    // Determine config path
    let config_path = std::env::var("SHOWTUNES_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Storage directory: {:?}", config.storage.dir);

    // One scheduler per quota entry
    let schedulers =
        Schedulers::from_quotas(config.quotas.iter()).context("Failed to build schedulers")?;

    // Dedup store (read lazily on first use)
    let storage: Arc<dyn SnapshotStorage> = Arc::new(FsSnapshotStorage::new(&config.storage.dir));
    let dedup = DedupStore::new(
        config.orchestrator.dedup_store.clone(),
        storage,
        Duration::from_secs(config.storage.flush_interval_secs),
    );

    // Providers in fallback order
    let providers =
        create_providers(&config.providers, &schedulers).context("Failed to create providers")?;
    if providers.is_empty() {
        warn!("No providers enabled, shows will never resolve");
    }

    let orchestrator = Arc::new(ThemeOrchestrator::new(
        config.orchestrator.clone(),
        providers,
        dedup.clone(),
    ));
    info!(
        "Orchestrator initialized with providers: {:?}",
        orchestrator.provider_names()
    );

    // Sweeper if a show source is configured
    let sweeper = match &config.sonarr {
        Some(sonarr_config) => {
            info!("Initializing Sonarr client at {}", sonarr_config.url);
            let source: Arc<dyn ShowSource> = Arc::new(
                SonarrClient::new(sonarr_config).context("Failed to create Sonarr client")?,
            );
            let sweeper = Arc::new(Sweeper::new(
                source,
                Arc::clone(&orchestrator),
                Duration::from_secs(config.orchestrator.sweep_backoff_secs),
            ));
            if config.orchestrator.sweep_interval_secs > 0 {
                sweeper.start(Duration::from_secs(config.orchestrator.sweep_interval_secs));
            }
            Some(sweeper)
        }
        None => {
            info!("Sonarr not configured, sweeps disabled");
            None
        }
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        schedulers,
        Arc::clone(&orchestrator),
        sweeper.clone(),
    ));

    // Create router
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

    if let Some(ref sweeper) = sweeper {
        sweeper.stop();
    }

    // Final flush so marks made since the last periodic flush survive
    dedup.stop();
    dedup
        .flush()
        .await
        .context("Failed to flush dedup store on shutdown")?;
    info!("Dedup store flushed");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
