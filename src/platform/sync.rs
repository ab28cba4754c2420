//! TelemetrySyncer: periodic poll cycle over all registered devices
//!
//! Runs in a background tokio task. Each cycle reads the device registry,
//! fans out one concurrent telemetry fetch per device, merges successful
//! snapshots into the state cache, and triggers a broadcast. The interval
//! is measured from the end of one cycle's broadcast to the start of the
//! next cycle.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::cache::StateCache;
use crate::db::SqliteDb;
use crate::gateway::BroadcastGateway;
use crate::models::DeviceSnapshot;
use crate::platform::PlatformClient;

/// Upper bound on in-flight telemetry requests within one cycle
const MAX_CONCURRENT_FETCHES: usize = 8;

/// Background poll service
pub struct TelemetrySyncer {
    db: SqliteDb,
    platform: Arc<PlatformClient>,
    cache: Arc<StateCache>,
    gateway: Arc<BroadcastGateway>,
    interval: Duration,
}

impl TelemetrySyncer {
    pub fn new(
        db: SqliteDb,
        platform: Arc<PlatformClient>,
        cache: Arc<StateCache>,
        gateway: Arc<BroadcastGateway>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            platform,
            cache,
            gateway,
            interval,
        }
    }

    /// Run the poll loop until the cancellation token fires
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            "[Sync] Starting poll loop (interval: {}s)",
            self.interval.as_secs()
        );

        loop {
            self.run_cycle().await;

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("[Sync] Poll loop stopped");
                    break;
                }
                _ = time::sleep(self.interval) => {}
            }
        }
    }

    /// One poll cycle: registry read, concurrent fetch fan-out, cache merge,
    /// broadcast. Never fatal; failures are logged and the loop continues.
    async fn run_cycle(&self) {
        let devices = match self.db.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                tracing::error!("[Sync] Registry read failed: {}", e);
                return;
            }
        };

        if devices.is_empty() {
            return;
        }

        let device_count = devices.len();
        let snapshots: Vec<DeviceSnapshot> = stream::iter(devices.into_iter().map(|device| {
            let platform = self.platform.clone();
            async move { platform.fetch_telemetry(&device.id).await }
        }))
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await;

        let (updated, failed) = apply_snapshots(&self.cache, snapshots).await;
        tracing::debug!(
            "[Sync] Cycle complete: {} devices, {} updated, {} failed",
            device_count,
            updated,
            failed
        );

        self.gateway.publish().await;
    }
}

/// Merge fetch results into the cache. Error snapshots are discarded so the
/// last good value survives; they never overwrite a cached entry.
async fn apply_snapshots(cache: &StateCache, snapshots: Vec<DeviceSnapshot>) -> (usize, usize) {
    let mut updated = 0;
    let mut failed = 0;

    for snapshot in snapshots {
        match &snapshot.error {
            Some(error) => {
                tracing::warn!("[Sync] Fetch failed for {}: {}", snapshot.device_id, error);
                failed += 1;
            }
            None => {
                cache.put(snapshot).await;
                updated += 1;
            }
        }
    }

    (updated, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_snapshot_never_creates_an_entry() {
        let cache = StateCache::new();
        let failed = DeviceSnapshot::failed("d1", "timeout".to_string());

        apply_snapshots(&cache, vec![failed]).await;
        assert!(cache.get("d1").await.is_none());
    }

    #[tokio::test]
    async fn test_error_snapshot_preserves_last_good_value() {
        let cache = StateCache::new();

        let mut good = DeviceSnapshot::empty("d1");
        good.water_level = 5.0;
        let (updated, failed) = apply_snapshots(&cache, vec![good]).await;
        assert_eq!((updated, failed), (1, 0));

        let stale = DeviceSnapshot::failed("d1", "status 500".to_string());
        let (updated, failed) = apply_snapshots(&cache, vec![stale]).await;
        assert_eq!((updated, failed), (0, 1));

        let cached = cache.get("d1").await.unwrap();
        assert_eq!(cached.water_level, 5.0);
        assert!(cached.error.is_none());
    }

    #[tokio::test]
    async fn test_successful_snapshot_overwrites() {
        let cache = StateCache::new();

        let mut first = DeviceSnapshot::empty("d1");
        first.water_level = 1.0;
        let mut second = DeviceSnapshot::empty("d1");
        second.water_level = 2.0;

        apply_snapshots(&cache, vec![first]).await;
        apply_snapshots(&cache, vec![second]).await;

        assert_eq!(cache.get("d1").await.unwrap().water_level, 2.0);
    }
}
