//! # KindlePlus Server
//!
//! Runs the REST API. Configuration comes from the environment (and `.env`).
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin kindleplus-server
//!
//! # Apply migrations and exit
//! cargo run --bin kindleplus-server -- --migrate-only
//!
//! # Validate configuration without touching the database
//! cargo run --bin kindleplus-server -- --check-config
//! ```

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use kindleplus::config::AppConfig;
use kindleplus::database::DatabaseConnection;
use kindleplus::logging;
use kindleplus::web::{create_app, state::AppState};

#[derive(Parser)]
#[command(name = "kindleplus-server")]
#[command(about = "KindlePlus e-book store REST API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Address to listen on, overriding BIND_ADDRESS
    #[arg(short, long)]
    bind: Option<String>,

    /// Apply database migrations and exit
    #[arg(long)]
    migrate_only: bool,

    /// Load and validate configuration, print it with secrets redacted, and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    logging::init_structured_logging(&config.environment, &config.log_format);

    if cli.check_config {
        let redacted = serde_json::to_string_pretty(&config.redacted())?;
        println!("{redacted}");
        return Ok(());
    }

    info!("🚀 Starting {}...", config.project_name);
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config.environment);

    let db = DatabaseConnection::connect(&config)
        .await
        .context("failed to connect to the database")?;
    db.migrate().await.context("failed to apply migrations")?;

    if cli.migrate_only {
        info!("✅ Migrations applied");
        db.close().await;
        return Ok(());
    }

    let bind_address = cli.bind.unwrap_or_else(|| config.bind_address.clone());
    let state = AppState::new(config, db.pool().clone())?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!("   Listening on {}", listener.local_addr()?);
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    db.close().await;
    info!("👋 Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }

    info!("🛑 Shutdown signal received, draining connections...");
}
