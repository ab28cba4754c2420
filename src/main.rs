//! pumpwatch-gateway - Water Pump Telemetry Relay
//!
//! Polls a ThingsBoard-style IoT platform for per-device pump telemetry,
//! caches the latest snapshot per device, and fans updates out to
//! authenticated browser clients over WebSocket. Operator commands are
//! relayed back to the platform as two-way RPCs.

mod api;
mod cache;
mod config;
mod db;
mod error;
mod gateway;
mod models;
mod platform;
mod sessions;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::StateCache;
use crate::db::SqliteDb;
use crate::gateway::{BroadcastGateway, GatewayState};
use crate::platform::{PlatformClient, TelemetrySyncer};
use crate::sessions::SessionStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pumpwatch_gateway=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting pumpwatch-gateway...");

    // Load configuration
    let config = config::Config::load()?;
    tracing::info!("Configuration loaded");

    // Open the device registry
    let db = SqliteDb::connect(&config).await?;

    // Shared components
    let cache = Arc::new(StateCache::new());
    let sessions = Arc::new(SessionStore::new(config.auth.session_duration_hours));
    let platform = Arc::new(PlatformClient::new(&config.platform));
    let broadcast = Arc::new(BroadcastGateway::new(
        db.clone(),
        cache.clone(),
        platform.clone(),
    ));

    let state = GatewayState {
        db: db.clone(),
        cache: cache.clone(),
        sessions,
        platform: platform.clone(),
        gateway: broadcast.clone(),
        auth_config: config.auth.clone(),
    };

    // Start the background poll loop with an assertable shutdown signal
    let shutdown = CancellationToken::new();
    start_background_tasks(
        db,
        platform,
        cache,
        broadcast,
        Duration::from_secs(config.poll.interval_secs),
        &shutdown,
    );

    // Build application router
    let cors = CorsLayer::permissive();

    let app = api::routes()
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Start background tasks (telemetry poll loop)
fn start_background_tasks(
    db: SqliteDb,
    platform: Arc<PlatformClient>,
    cache: Arc<StateCache>,
    broadcast: Arc<BroadcastGateway>,
    interval: Duration,
    shutdown: &CancellationToken,
) {
    let syncer = Arc::new(TelemetrySyncer::new(
        db, platform, cache, broadcast, interval,
    ));

    let token = shutdown.child_token();
    tokio::spawn(async move {
        syncer.start(token).await;
    });

    tracing::info!("Background tasks started");
}

/// Resolve on Ctrl-C; cancels the poll loop and drains the server
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
