use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{error, info};

use crate::{
    alerts,
    models::{DeviceAlert, PowerThresholds, RoomStatus},
    rooms,
    snapshot_cache::{Snapshot, SnapshotCache},
    tuya::{error::Result, TuyaClient},
};

/// Hostel-level view over the gateway: periodic polling into the
/// [`SnapshotCache`] plus the on-demand room, alert and control helpers.
#[derive(Clone)]
pub struct MonitorService {
    tuya: TuyaClient,
    cache: SnapshotCache,
    thresholds: PowerThresholds,
}

impl MonitorService {
    pub fn new(tuya: TuyaClient, cache: SnapshotCache, thresholds: PowerThresholds) -> Self {
        Self {
            tuya,
            cache,
            thresholds,
        }
    }

    /// Runs the polling loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Device polling loop started");
        let mut ticker = time::interval(interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "Device poll failed; keeping previous snapshot");
            }
        }
    }

    /// Fetch every device once and publish the derived snapshot.
    ///
    /// On failure the cache keeps whatever it held before, so readers never
    /// see an empty list standing in for "provider unreachable".
    pub async fn poll_once(&self) -> Result<Snapshot> {
        let devices = self.tuya.try_list_devices().await?;
        let polled_at = Utc::now();

        let snapshot = Snapshot {
            rooms: rooms::normalize_with(&devices, &self.thresholds),
            alerts: alerts::detect_with(&devices, &self.thresholds, polled_at),
            devices,
            polled_at,
        };

        info!(
            devices = snapshot.devices.len(),
            alerts = snapshot.alerts.len(),
            "Snapshot published"
        );
        self.cache.publish(snapshot.clone()).await;
        Ok(snapshot)
    }

    /// Live room statuses; empty when the provider cannot be reached.
    pub async fn hostel_room_data(&self) -> Vec<RoomStatus> {
        let devices = self.tuya.list_devices().await;
        rooms::normalize_with(&devices, &self.thresholds)
    }

    /// Live alerts; empty when the provider cannot be reached.
    pub async fn active_alerts(&self) -> Vec<DeviceAlert> {
        let devices = self.tuya.list_devices().await;
        alerts::detect_with(&devices, &self.thresholds, Utc::now())
    }

    pub async fn active_alert_count(&self) -> usize {
        self.active_alerts().await.len()
    }

    /// Rooms are identified by their plug, so this switches the device
    /// whose id is `room_id`.
    pub async fn control_room_power(&self, room_id: &str, power_state: bool) -> bool {
        self.tuya.control_device(room_id, power_state).await
    }
}
