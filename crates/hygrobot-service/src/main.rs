//! Hygrobot Service - humidity monitor and HTTP API.
//!
//! Run with: `cargo run -p hygrobot-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use hygrobot_core::{
    AlertEngine, LinkReader, Messenger, Monitor, MonitorConfig, Repository, SerialTransport,
};
use hygrobot_service::messenger::{LogMessenger, WebhookMessenger};
use hygrobot_service::repo::SqliteRepository;
use hygrobot_service::{AppState, Config, api, middleware};
use hygrobot_store::Store;

/// Hygrobot Service - background humidity monitor and HTTP REST API.
#[derive(Parser, Debug)]
#[command(name = "hygrobot-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Serial port path (overrides config).
    #[arg(short, long)]
    port: Option<String>,

    /// Disable the background monitoring loop (API only mode).
    #[arg(long)]
    no_monitor: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hygrobot_service=info".parse()?)
                .add_directive("hygrobot_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if let Some(port) = args.port {
        config.link.port = port;
    }

    // Fail on a bad configuration before any task starts
    config.validate()?;

    // Open the database
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;
    let repo = Arc::new(SqliteRepository::new(store));

    // Sensor link
    let reader = Arc::new(LinkReader::new(
        Arc::new(SerialTransport),
        config.link.to_link_config(),
    ));

    // Notification delivery
    let messenger: Arc<dyn Messenger> = match &config.webhook.url {
        Some(url) => {
            info!("Delivering notifications to {}", url);
            Arc::new(WebhookMessenger::new(url.clone()))
        }
        None => {
            warn!("No webhook configured; notifications go to the log only");
            Arc::new(LogMessenger)
        }
    };

    let cancel = CancellationToken::new();
    let mut monitor_task = None;

    // Start the monitoring loop
    if !args.no_monitor {
        let engine = AlertEngine::with_cooldown(
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::clone(&messenger),
            time::Duration::seconds(config.alerts.cooldown_seconds as i64),
        );
        let monitor = Monitor::new(
            Arc::clone(&reader),
            engine,
            Arc::clone(&repo) as Arc<dyn Repository>,
            Arc::clone(&messenger),
            MonitorConfig {
                tick: std::time::Duration::from_secs(config.alerts.tick_seconds),
                error_pause: std::time::Duration::from_secs(config.alerts.error_pause_seconds),
            },
        );
        let token = cancel.clone();
        monitor_task = Some(tokio::spawn(async move {
            monitor.run(token).await;
        }));
    } else {
        info!("Background monitoring disabled");
    }

    // Retention purge, once per day
    if let Some(days) = config.retention.days {
        let repo = Arc::clone(&repo);
        let token = cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(86_400));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        match repo.purge_readings_older_than(days).await {
                            Ok(deleted) if deleted > 0 => {
                                info!("Purged {deleted} readings older than {days} days");
                            }
                            Ok(_) => {}
                            Err(e) => error!("Retention purge failed: {e}"),
                        }
                    }
                }
            }
        });
    }

    // Create application state
    let state = AppState::new(
        Arc::clone(&repo) as Arc<dyn Repository>,
        reader,
        config.server.stale_after_seconds,
    );

    // Build the router
    let security = Arc::new(config.security.clone());
    let app = Router::new()
        .merge(api::router())
        .layer(axum::middleware::from_fn_with_state(
            security,
            middleware::api_key_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Parse bind address
    let addr: SocketAddr = config.server.bind.parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tasks and wait for the monitor to release the port
    cancel.cancel();
    if let Some(task) = monitor_task {
        let _ = task.await;
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}
