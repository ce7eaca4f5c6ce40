//! indclass-classifier - Industry classification service
//!
//! Serves SIC, NAICS and MCC classification over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use indclass_common::RequestContext;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use indclass_classifier::{bootstrap, build_router, AppState, IndustryClassifier, ServiceConfig};

/// Command-line arguments for indclass-classifier
#[derive(Parser, Debug)]
#[command(name = "indclass-classifier")]
#[command(about = "Industry code classification service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Seed file of industry codes to load at startup
    #[arg(long, env = "INDCLASS_SEED")]
    seed: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "indclass_classifier=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.db_path {
        config.database.path = Some(path);
    }

    info!("Starting indclass-classifier v{}", env!("CARGO_PKG_VERSION"));

    let store = bootstrap::open_store(&config.database)
        .await
        .context("Failed to open code store")?;
    let seeded = bootstrap::seed(store.as_ref(), &RequestContext::new(), args.seed.as_deref())
        .await
        .context("Failed to seed code store")?;
    info!(seeded, "Code store ready");

    let classifier = Arc::new(IndustryClassifier::new(store, &config));
    info!(strategies = ?classifier.strategy_names(), "Classifier initialized");

    let state = AppState::new(classifier, config.classifier.request_timeout());
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
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
