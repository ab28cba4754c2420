//! Platform HTTP client: telemetry fetching and device RPC dispatch
//!
//! Both paths share the session token manager and its retry policy: a 401
//! invalidates the cached token and the request is retried exactly once.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::models::{DeviceCommand, DeviceSnapshot, PumpMode};

use super::auth::SessionTokenManager;

/// Telemetry keys requested from the platform, latest sample each
const TELEMETRY_KEYS: &str = "waterLevel,pumpStatus,mode,alert";

/// One sample of a timeseries key
#[derive(Debug, Deserialize)]
struct TimeseriesSample {
    value: Value,
}

type TimeseriesResponse = HashMap<String, Vec<TimeseriesSample>>;

pub struct PlatformClient {
    http_client: Client,
    base_url: String,
    auth: SessionTokenManager,
}

impl PlatformClient {
    pub fn new(config: &PlatformConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        let auth = SessionTokenManager::new(http_client.clone(), config);

        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    // ========================================================================
    // Telemetry fetch
    // ========================================================================

    /// Fetch the latest telemetry snapshot for a device.
    ///
    /// Total: any failure is reported as an error-tagged snapshot, never an
    /// Err, so one bad device cannot fail a poll cycle.
    pub async fn fetch_telemetry(&self, device_id: &str) -> DeviceSnapshot {
        match self.fetch_with_retry(device_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => DeviceSnapshot::failed(device_id, e.to_string()),
        }
    }

    async fn fetch_with_retry(&self, device_id: &str) -> Result<DeviceSnapshot, PlatformError> {
        match self.fetch_once(device_id).await {
            Err(PlatformError::AuthExpired) => {
                self.auth.invalidate().await;
                self.fetch_once(device_id).await
            }
            other => other,
        }
    }

    async fn fetch_once(&self, device_id: &str) -> Result<DeviceSnapshot, PlatformError> {
        let token = self.auth.get_token().await?;

        let url = format!(
            "{}/api/plugins/telemetry/DEVICE/{}/values/timeseries?keys={}&limit=1",
            self.base_url, device_id, TELEMETRY_KEYS
        );

        let resp = self
            .http_client
            .get(&url)
            .header("X-Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("telemetry request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(PlatformError::AuthExpired);
        }
        if !status.is_success() {
            return Err(PlatformError::Status(status.as_u16()));
        }

        let data: TimeseriesResponse = resp
            .json()
            .await
            .map_err(|e| PlatformError::Transport(format!("telemetry parse failed: {}", e)))?;

        Ok(parse_snapshot(device_id, &data))
    }

    // ========================================================================
    // RPC command dispatch
    // ========================================================================

    /// Send a validated command to a device as a two-way RPC.
    ///
    /// Returns false on any failure after the single 401 retry; never raises.
    pub async fn send_command(&self, device_id: &str, command: &DeviceCommand) -> bool {
        let result = match self.send_once(device_id, command).await {
            Err(PlatformError::AuthExpired) => {
                self.auth.invalidate().await;
                self.send_once(device_id, command).await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    "[Platform] RPC '{}' sent to {}",
                    command.method(),
                    device_id
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    "[Platform] RPC '{}' to {} failed: {}",
                    command.method(),
                    device_id,
                    e
                );
                false
            }
        }
    }

    async fn send_once(
        &self,
        device_id: &str,
        command: &DeviceCommand,
    ) -> Result<(), PlatformError> {
        let token = self.auth.get_token().await?;

        let url = format!("{}/api/plugins/rpc/twoway/{}", self.base_url, device_id);
        let body = serde_json::json!({
            "method": command.method(),
            "params": command.params(),
        });

        let resp = self
            .http_client
            .post(&url)
            .header("X-Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(format!("rpc request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(PlatformError::AuthExpired);
        }
        if !status.is_success() {
            return Err(PlatformError::Status(status.as_u16()));
        }

        Ok(())
    }
}

// ============================================================================
// Telemetry parsing
// ============================================================================

/// Build a snapshot from a timeseries response, coercing loosely-typed
/// values. Missing keys fall back to defaults.
fn parse_snapshot(device_id: &str, data: &TimeseriesResponse) -> DeviceSnapshot {
    let mut snapshot = DeviceSnapshot::empty(device_id);
    snapshot.fetched_at = Utc::now();

    if let Some(value) = latest_value(data, "waterLevel") {
        snapshot.water_level = coerce_f64(value);
    }
    if let Some(value) = latest_value(data, "pumpStatus") {
        snapshot.pump_status = coerce_bool(value);
    }
    if let Some(value) = latest_value(data, "mode") {
        snapshot.mode = coerce_mode(device_id, value);
    }
    if let Some(value) = latest_value(data, "alert") {
        snapshot.alert = value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }

    snapshot
}

fn latest_value<'a>(data: &'a TimeseriesResponse, key: &str) -> Option<&'a Value> {
    data.get(key).and_then(|samples| samples.first()).map(|s| &s.value)
}

fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn coerce_mode(device_id: &str, value: &Value) -> PumpMode {
    match value.as_str() {
        Some(s) if s.eq_ignore_ascii_case("manual") => PumpMode::Manual,
        Some(s) if s.eq_ignore_ascii_case("automatic") => PumpMode::Automatic,
        other => {
            tracing::debug!(
                "[Platform] Unrecognized mode {:?} for {}, using automatic",
                other,
                device_id
            );
            PumpMode::Automatic
        }
    }
}
