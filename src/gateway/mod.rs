//! Broadcast gateway - live client connections and device-list fan-out

pub mod handler;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

use crate::cache::StateCache;
use crate::config::AuthConfig;
use crate::db::SqliteDb;
use crate::error::AppError;
use crate::models::{
    Device, DeviceCommand, DeviceSnapshot, DeviceView, InboundMessage, OutboundMessage,
};
use crate::platform::PlatformClient;
use crate::sessions::SessionStore;

/// Shared application state for the HTTP and WebSocket layers
#[derive(Clone)]
pub struct GatewayState {
    pub db: SqliteDb,
    pub cache: Arc<StateCache>,
    pub sessions: Arc<SessionStore>,
    pub platform: Arc<PlatformClient>,
    pub gateway: Arc<BroadcastGateway>,
    pub auth_config: AuthConfig,
}

/// Registry of live, authenticated client connections, plus the broadcast
/// fan-out over them. Connections enter only through the session-gated
/// WebSocket handler and leave on disconnect, read error, or send failure.
pub struct BroadcastGateway {
    db: SqliteDb,
    cache: Arc<StateCache>,
    platform: Arc<PlatformClient>,
    connections: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    next_conn_id: AtomicU64,
}

impl BroadcastGateway {
    pub fn new(db: SqliteDb, cache: Arc<StateCache>, platform: Arc<PlatformClient>) -> Self {
        Self {
            db,
            cache,
            platform,
            connections: RwLock::new(HashMap::new()),
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Register a connection; returns its id and the outbound message queue
    pub async fn register(&self) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        let count = {
            let mut connections = self.connections.write().await;
            connections.insert(conn_id, tx);
            connections.len()
        };
        tracing::info!("[Gateway] Client connected ({} active)", count);

        (conn_id, rx)
    }

    pub async fn remove_connection(&self, conn_id: u64) {
        let count = {
            let mut connections = self.connections.write().await;
            connections.remove(&conn_id);
            connections.len()
        };
        tracing::info!("[Gateway] Client disconnected ({} active)", count);
    }

    /// Send the current device list to one connection (used on accept so a
    /// new client is not left waiting for the next poll cycle)
    pub async fn send_snapshot_to(&self, conn_id: u64) {
        let payload = match self.device_list_payload().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("[Gateway] Initial snapshot failed: {}", e);
                return;
            }
        };

        let sender = self.connections.read().await.get(&conn_id).cloned();
        if let Some(tx) = sender {
            let _ = tx.send(Message::Text(payload));
        }
    }

    /// Broadcast the current device list to every connection. Iterates over
    /// a point-in-time copy of the senders; failed senders are deregistered
    /// after the iteration.
    pub async fn publish(&self) {
        let senders: Vec<(u64, mpsc::UnboundedSender<Message>)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(conn_id, tx)| (*conn_id, tx.clone()))
            .collect();

        if senders.is_empty() {
            return;
        }

        let payload = match self.device_list_payload().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("[Gateway] Broadcast skipped: {}", e);
                return;
            }
        };

        let mut dead = Vec::new();
        for (conn_id, tx) in senders {
            if tx.send(Message::Text(payload.clone())).is_err() {
                dead.push(conn_id);
            }
        }

        if !dead.is_empty() {
            let mut connections = self.connections.write().await;
            for conn_id in &dead {
                connections.remove(conn_id);
            }
            tracing::debug!("[Gateway] Dropped {} dead connections", dead.len());
        }
    }

    async fn device_list_payload(&self) -> Result<String, AppError> {
        let devices = self.db.list_devices().await?;
        let snapshots = self.cache.snapshot_all().await;
        let message = OutboundMessage::AllDevices {
            data: build_device_list(&devices, &snapshots),
        };

        serde_json::to_string(&message)
            .map_err(|e| AppError::InternalError(format!("serialize failed: {}", e)))
    }

    /// Dispatch one inbound client message. Malformed or invalid messages
    /// are logged and dropped; the connection stays open either way.
    pub async fn handle_inbound(&self, raw: &str) {
        let message: InboundMessage = match serde_json::from_str(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("[Gateway] Ignoring malformed message: {}", e);
                return;
            }
        };

        match message {
            InboundMessage::AddDevice { device } => {
                let id = device.id.trim();
                let name = device.name.trim();
                if id.is_empty() || name.is_empty() {
                    tracing::warn!("[Gateway] add_device rejected: empty id or name");
                    return;
                }

                if let Err(e) = self.db.upsert_device(id, name, device.location.trim()).await {
                    tracing::warn!("[Gateway] add_device failed: {}", e);
                    return;
                }
                self.publish().await;
            }
            InboundMessage::RemoveDevice { device_id } => {
                if let Err(e) = self.db.delete_device(&device_id).await {
                    tracing::warn!("[Gateway] remove_device failed: {}", e);
                    return;
                }
                self.cache.remove(&device_id).await;
                self.publish().await;
            }
            InboundMessage::Command {
                device_id,
                command,
                params,
            } => {
                match self.db.get_device(&device_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!(
                            "[Gateway] command rejected: unknown device {}",
                            device_id
                        );
                        return;
                    }
                    Err(e) => {
                        tracing::warn!("[Gateway] command registry check failed: {}", e);
                        return;
                    }
                }

                let validated = match DeviceCommand::validate(&command, &params) {
                    Some(validated) => validated,
                    None => {
                        tracing::warn!(
                            "[Gateway] command rejected: invalid '{}' payload for {}",
                            command,
                            device_id
                        );
                        return;
                    }
                };

                // Fire and forget; the next poll cycle reflects the outcome
                let platform = self.platform.clone();
                tokio::spawn(async move {
                    platform.send_command(&device_id, &validated).await;
                });
            }
        }
    }
}

/// Left join of the registry list with cached telemetry: every registered
/// device appears exactly once; telemetry fields only where a snapshot
/// exists. Cache entries for unregistered devices are pruned here, not by
/// cache deletion.
pub fn build_device_list(
    devices: &[Device],
    snapshots: &HashMap<String, DeviceSnapshot>,
) -> Vec<DeviceView> {
    devices
        .iter()
        .map(|device| {
            let snapshot = snapshots.get(&device.id);
            DeviceView {
                id: device.id.clone(),
                name: device.name.clone(),
                location: device.location.clone(),
                water_level: snapshot.map(|s| s.water_level),
                pump_status: snapshot.map(|s| s.pump_status),
                mode: snapshot.map(|s| s.mode),
                alert: snapshot.and_then(|s| s.alert.clone()),
            }
        })
        .collect()
}
