//! API module - HTTP handlers and routes

mod auth;
mod devices;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::gateway::{handler::ws_handler, GatewayState};

pub fn routes() -> Router<GatewayState> {
    Router::new()
        // Health check
        .route("/api/health", get(health_check))
        // Operator auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // Devices
        .route("/api/devices", get(devices::list_devices))
        // Live telemetry stream
        .route("/ws", get(ws_handler))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}
