//! Operator authentication handlers
//!
//! - POST /api/auth/login  - email+password login, issues a session ID
//! - POST /api/auth/logout - revoke a session

use axum::{extract::State, response::IntoResponse, Json};

use crate::error::AppError;
use crate::gateway::GatewayState;
use crate::models::{LoginRequest, LoginResponse, LogoutRequest};

/// POST /api/auth/login
/// Authenticate with the configured operator email + password (bcrypt)
pub async fn login(
    State(state): State<GatewayState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let auth = &state.auth_config;

    if req.email != auth.operator_email {
        tracing::warn!("Login failed: unknown email {}", req.email);
        return Err(AppError::BadRequest(
            "Invalid email or password".to_string(),
        ));
    }

    if auth.operator_password_hash.is_empty() {
        tracing::error!("Login failed: operator_password_hash is not configured");
        return Err(AppError::InternalError(
            "Operator authentication is not configured".to_string(),
        ));
    }

    let valid = bcrypt::verify(&req.password, &auth.operator_password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {}", e)))?;

    if !valid {
        tracing::warn!("Login failed: wrong password for {}", req.email);
        return Err(AppError::BadRequest(
            "Invalid email or password".to_string(),
        ));
    }

    let (session_id, expires_at) = state.sessions.create(&req.email).await;
    tracing::info!("Operator {} logged in", req.email);

    Ok(Json(LoginResponse {
        ok: true,
        session_id,
        expires_at,
    }))
}

/// POST /api/auth/logout
/// Revoke the given session
pub async fn logout(
    State(state): State<GatewayState>,
    Json(req): Json<LogoutRequest>,
) -> impl IntoResponse {
    state.sessions.revoke(&req.session_id).await;
    Json(serde_json::json!({"ok": true}))
}
