use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use practice_desk::api::rate_limit::spawn_cleanup_task;
use practice_desk::config::{Config, ServerConfig};
use practice_desk::AppState;

#[derive(Parser, Debug)]
#[command(name = "practice-desk")]
#[command(author, version, about = "Practice management backend for psychologists", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "practice-desk.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "PRACTICE_DESK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Override the access token signing secret
    #[arg(long, env = "PRACTICE_DESK_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    if cli.jwt_secret.is_some() {
        config.auth.jwt_secret = cli.jwt_secret.clone();
    }

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Practice Desk v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    practice_desk::utils::ensure_dir(&config.server.data_dir)?;

    // Initialize database
    let db = practice_desk::db::init(&config.server.data_dir).await?;

    // Ensure the configured admin account exists
    practice_desk::db::seed_admin_user(&db, &config.auth).await?;

    let state = Arc::new(AppState::new(config.clone(), db));

    if config.rate_limit.enabled {
        spawn_cleanup_task(state.rate_limiter.clone(), config.rate_limit.cleanup_interval);
    }

    let mut app = practice_desk::api::create_router(state);

    // Serve the built SPA with index.html fallback, API routes first
    let static_dir = &config.server.static_dir;
    if static_dir.is_dir() {
        let serve_static =
            ServeDir::new(static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));
        app = app.fallback_service(serve_static);
        tracing::info!("Serving static files from {}", static_dir.display());
    }

    let app = app.layer(cors_layer(&config.server)?);

    // Start API server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// CORS for the SPA; no configured origins allows any origin
fn cors_layer(server: &ServerConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if server.cors_origins.is_empty() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = server
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
