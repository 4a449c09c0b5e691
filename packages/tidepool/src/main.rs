use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use tidepool::config::{AuthConfig, ChatConfig, TidepoolConfig, load_config};
use tidepool::db::Database;
use tidepool::metrics::ServerMetrics;
use tidepool::repository::ChatRepository;
use tidepool::ws::RoomRegistry;
use tidepool::{AppState, build_router};

#[derive(Parser)]
#[command(name = "tidepool")]
#[command(about = "Chat server with hubs, rooms, and real-time fan-out")]
struct Cli {
    /// Host to bind to
    #[arg(short = 'b', long, default_value = "127.0.0.1")]
    host: String,

    /// Port for the web server
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Custom data directory (defaults to ~/.tidepool)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Clean start - delete the database before starting
    #[arg(long)]
    reset_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "tidepool=debug,tower_http=debug,info"
    } else {
        "tidepool=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Tidepool chat server");

    let config = Arc::new(TidepoolConfig::new(cli.data_dir)?);

    if cli.reset_db && config.db_path.exists() {
        config.reset_database()?;
        info!("Database reset");
    }

    // Layered file/env config
    let file_config: tidepool::config::FileConfig = load_config(&config.data_dir)
        .extract()
        .context("Failed to load configuration")?;
    let auth_config = Arc::new(AuthConfig::from_file(&file_config.auth));
    let chat_config = Arc::new(ChatConfig::from_file(&file_config.chat));

    let host = file_config.server.host.clone().unwrap_or(cli.host);
    let port = file_config.server.port.unwrap_or(cli.port);

    info!("Initializing database...");
    let db = Arc::new(Database::new(&config).await?);
    let repository = Arc::new(ChatRepository::new(db.pool.clone()));

    info!(
        "Auth: registration {}, session TTL {}s",
        if auth_config.allow_registration {
            "open"
        } else {
            "closed"
        },
        auth_config.session_ttl_secs
    );

    // Periodic expired session cleanup
    let cleanup_repo = repository.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match cleanup_repo.cleanup_expired_sessions().await {
                Ok(n) if n > 0 => info!("Cleaned up {} expired sessions", n),
                _ => {}
            }
        }
    });

    let state = AppState {
        config: config.clone(),
        auth_config,
        chat_config,
        metrics: Arc::new(ServerMetrics::new()),
        db,
        repository,
        registry: Arc::new(RoomRegistry::new()),
    };

    let app = build_router(state);

    let addr = format!("{host}:{port}").parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;
    info!("Tidepool listening on http://{}", actual_addr);

    let shutdown_signal = async {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::error!("Failed to install Ctrl+C handler");
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}
