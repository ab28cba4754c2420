//! Device listing handler

use axum::{extract::State, Json};

use crate::error::AppError;
use crate::gateway::{build_device_list, GatewayState};
use crate::models::DeviceView;

/// GET /api/devices
/// The registry joined with cached telemetry, same shape as the broadcast
pub async fn list_devices(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<DeviceView>>, AppError> {
    let devices = state.db.list_devices().await?;
    let snapshots = state.cache.snapshot_all().await;

    Ok(Json(build_device_list(&devices, &snapshots)))
}
