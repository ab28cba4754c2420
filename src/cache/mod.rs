//! In-memory telemetry state cache
//!
//! Holds the latest known snapshot per device. Written by the poll cycle
//! (and evicted on device removal), read by broadcast construction. Error
//! snapshots never reach the cache, so an entry only ever moves forward to
//! a newer successful sample.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::models::DeviceSnapshot;

#[derive(Default)]
pub struct StateCache {
    snapshots: RwLock<HashMap<String, DeviceSnapshot>>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot for a device, if one has ever been cached
    pub async fn get(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.snapshots.read().await.get(device_id).cloned()
    }

    /// Overwrite the entry for the snapshot's device
    pub async fn put(&self, snapshot: DeviceSnapshot) {
        self.snapshots
            .write()
            .await
            .insert(snapshot.device_id.clone(), snapshot);
    }

    /// Evict a device's entry (device removed from the registry)
    pub async fn remove(&self, device_id: &str) {
        self.snapshots.write().await.remove(device_id);
    }

    /// Point-in-time copy of the full mapping
    pub async fn snapshot_all(&self) -> HashMap<String, DeviceSnapshot> {
        self.snapshots.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let cache = StateCache::new();
        assert!(cache.get("d1").await.is_none());

        let mut snap = DeviceSnapshot::empty("d1");
        snap.water_level = 4.2;
        cache.put(snap).await;

        let got = cache.get("d1").await.unwrap();
        assert_eq!(got.water_level, 4.2);

        cache.remove("d1").await;
        assert!(cache.get("d1").await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_all_is_a_copy() {
        let cache = StateCache::new();
        cache.put(DeviceSnapshot::empty("d1")).await;

        let copy = cache.snapshot_all().await;
        cache.put(DeviceSnapshot::empty("d2")).await;

        assert_eq!(copy.len(), 1);
        assert_eq!(cache.snapshot_all().await.len(), 2);
    }
}
