//! Floor Predictor API (fp-api) - Main entry point
//!
//! Loads configuration and the storey model, starts the Urban API client
//! and serves the HTTP API (plus Prometheus metrics on a separate port)
//! until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fp_api::metrics::Metrics;
use fp_api::services::{
    ComputePool, FloorPredictorService, GeometryFeatureParser, HttpUrbanApiClient,
    LinearStoreyModel, UrbanApi,
};
use fp_api::{build_metrics_router, build_router, AppState};
use fp_common::config::{resolve_config_path, Config};
use fp_common::logging::init_logging;
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for fp-api
#[derive(Parser, Debug)]
#[command(name = "fp-api")]
#[command(about = "Floor Predictor microservice")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file (falls back to $CONFIG_PATH)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overrides `app.port`
    #[arg(short, long, env = "FP_API_PORT")]
    port: Option<u16>,

    /// Return detailed error bodies
    #[arg(long)]
    debug: bool,

    /// Write an example configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_example_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = args.write_example_config {
        Config::example()
            .dump(&path)
            .with_context(|| format!("Failed to write example config to {}", path.display()))?;
        println!("Example configuration written to {}", path.display());
        return Ok(());
    }

    let config_path = resolve_config_path(args.config.as_deref());
    let mut config = Config::from_file_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.app.port = port;
    }
    if args.debug {
        config.app.debug = true;
    }

    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting Floor Predictor API (fp-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => warn!("No configuration file given, using built-in example configuration"),
    }

    let model = LinearStoreyModel::load(&config.model.path)
        .with_context(|| format!("Failed to load model from {}", config.model.path.display()))?;

    let client = Arc::new(
        HttpUrbanApiClient::from_config(&config.urban_api)
            .context("Failed to create Urban API client")?,
    );
    client
        .start()
        .await
        .context("Failed to start Urban API client")?;
    if !client.is_alive().await {
        warn!(host = %client.base_url(), "Urban API does not respond to ping, continuing anyway");
    }

    let urban_api: Arc<dyn UrbanApi> = client.clone();
    let service = FloorPredictorService::new(
        Arc::clone(&urban_api),
        Arc::new(GeometryFeatureParser::new(config.compute.neighborhood_radius_m)),
        Arc::new(model),
        ComputePool::new(config.compute.workers),
    )
    .with_min_buildings(config.compute.min_buildings);
    info!(workers = config.compute.workers, "Compute pool ready");

    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(
        Arc::new(service),
        urban_api,
        Arc::clone(&metrics),
        config.app.debug,
    );
    let app = build_router(state);

    if config.metrics.disable {
        info!("Metrics endpoint disabled");
    } else {
        let addr = SocketAddr::new(
            config
                .app
                .host
                .parse()
                .context("Invalid app.host address")?,
            config.metrics.port,
        );
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics listener to {}", addr))?;
        info!("Metrics listening on http://{}/metrics", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, build_metrics_router(metrics)).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let addr = SocketAddr::new(
        config.app.host.parse().context("Invalid app.host address")?,
        config.app.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("fp-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    client.close().await;
    info!("Server shutdown complete");
    served
}

/// Graceful shutdown signal handler
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
