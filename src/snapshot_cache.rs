use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{DeviceAlert, DeviceReading, RoomStatus};

/// Result of one successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub devices: Vec<DeviceReading>,
    pub rooms: Vec<RoomStatus>,
    pub alerts: Vec<DeviceAlert>,
    pub polled_at: DateTime<Utc>,
}

/// In-memory store of the most recent `Snapshot`.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
#[derive(Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<RwLock<Option<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached snapshot wholesale.
    pub async fn publish(&self, snapshot: Snapshot) {
        *self.inner.write().await = Some(snapshot);
    }

    /// Apply `f` to the latest snapshot under one read lock, so everything
    /// `f` picks out (including `polled_at`) comes from the same poll.
    /// `None` until the first successful poll.
    pub async fn view<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Option<T> {
        self.inner.read().await.as_ref().map(f)
    }
}
