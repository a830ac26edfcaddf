use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockpile::api::rate_limit::spawn_cleanup_task;
use stockpile::config::{Config, Overrides};
use stockpile::AppState;

#[derive(Parser, Debug)]
#[command(name = "stockpile")]
#[command(author, version, about = "Multi-tenant inventory and invoicing service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "stockpile.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "STOCKPILE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Secret used to sign session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Allow public self-registration (true/false)
    #[arg(long, env = "ALLOW_REGISTRATION")]
    allow_registration: Option<bool>,

    /// Comma separated list of origins allowed to call the API
    #[arg(long, env = "ALLOWED_ORIGINS")]
    allowed_origins: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_overrides(Overrides {
        jwt_secret: cli.jwt_secret,
        allow_registration: cli.allow_registration,
        allowed_origins: cli.allowed_origins,
    });

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

    tracing::info!("Starting Stockpile v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!("Failed to create data directory {}", config.server.data_dir.display())
    })?;
    let storage_dir = config.storage_dir();
    std::fs::create_dir_all(&storage_dir)
        .with_context(|| format!("Failed to create storage directory {}", storage_dir.display()))?;

    let db = stockpile::db::init(&config.server.data_dir).await?;

    if let (Some(email), Some(password)) = (
        config.auth.admin_email.as_deref(),
        config.auth.admin_password.as_deref(),
    ) {
        stockpile::api::auth::ensure_admin_user(&db, email, password).await?;
    }

    let state = Arc::new(AppState::new(config.clone(), db));
    tracing::info!(
        storage = %state.storage.root().display(),
        max_upload_bytes = state.storage.max_bytes(),
        session_ttl_seconds = state.sessions.ttl_seconds(),
        "Storage and sessions configured"
    );

    if config.rate_limit.cleanup_interval_seconds > 0 {
        spawn_cleanup_task(
            state.rate_limiter.clone(),
            config.rate_limit.cleanup_interval_seconds,
        );
    }

    let app = stockpile::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);
    if config.auth.allow_registration {
        tracing::info!("Public registration is enabled");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
