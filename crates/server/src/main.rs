use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frontdesk_core::{
    create_announcement_system, load_config, validate_config, AnnouncementSink, DispatchEngine,
    QueueStore, QueueView, SqliteCounterStore, SqliteQueueStore, TicketCounter,
};
use frontdesk_server::api::{create_router, WsBroadcaster};
use frontdesk_server::panel::{
    spawn_heartbeat, spawn_snapshot_forwarder, PanelSink, HEARTBEAT_INTERVAL,
};
use frontdesk_server::state::AppState;

/// How long shutdown waits for queued announcements.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

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

    // Determine config path
    let config_path = std::env::var("FRONTDESK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Tickets, patients and counters share one database file
    let queue_store: Arc<dyn QueueStore> = Arc::new(
        SqliteQueueStore::new(&config.database.path).context("Failed to open queue store")?,
    );
    let counter_store = Arc::new(
        SqliteCounterStore::new(&config.database.path)
            .context("Failed to open counter store")?,
    );
    info!("Queue store initialized");

    let ws_broadcaster = WsBroadcaster::default();

    let mut engine = DispatchEngine::new(
        config.dispatch.clone(),
        Arc::clone(&queue_store),
        TicketCounter::new(counter_store),
    );

    // Announcement writer consumes events emitted by the engine
    let writer_handle = if config.announcement.enabled {
        let sink: Arc<dyn AnnouncementSink> = Arc::new(PanelSink::new(ws_broadcaster.clone()));
        let (handle, writer) = create_announcement_system(
            sink,
            config.announcement.locale(),
            config.announcement.buffer_size,
        );
        engine = engine.with_announcements(handle);
        Some(tokio::spawn(writer.run()))
    } else {
        info!("Announcements disabled in config");
        None
    };
    let engine = Arc::new(engine);

    // Queue view and panel feed
    let view = Arc::new(QueueView::new(
        Arc::clone(&queue_store),
        config.view.refresh_interval(),
    ));
    let view_handle = view.start();
    let forwarder_handle = spawn_snapshot_forwarder(&view, ws_broadcaster.clone());
    let heartbeat_handle = spawn_heartbeat(ws_broadcaster.clone(), HEARTBEAT_INTERVAL);

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&engine),
        Arc::clone(&view),
        ws_broadcaster,
    ));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    view.stop();
    let _ = view_handle.await;
    heartbeat_handle.abort();
    forwarder_handle.abort();

    // Dropping the last engine closes the announcement channel so the writer
    // drains and exits. Open WebSocket tasks may still hold the state.
    drop(engine);
    if let Some(handle) = writer_handle {
        match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, handle).await {
            Ok(_) => info!("Announcement writer stopped"),
            Err(_) => warn!("Announcement writer did not drain in time"),
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
