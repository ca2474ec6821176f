//! Host state snapshots refreshed at the start of every drain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;

/// Read-only copy of host state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    /// Increments on every refresh. 0 means never refreshed.
    pub version: u64,
    pub taken_at: DateTime<Utc>,
    pub data: Value,
}

impl HostSnapshot {
    pub fn empty() -> Self {
        Self {
            version: 0,
            taken_at: Utc::now(),
            data: Value::Null,
        }
    }
}

/// Produces snapshot data from the host. Runs on the pump thread.
pub trait SnapshotProvider<H>: Send + Sync {
    fn snapshot(&self, host: &H) -> anyhow::Result<Value>;
}

impl<H, F> SnapshotProvider<H> for F
where
    F: Fn(&H) -> anyhow::Result<Value> + Send + Sync,
{
    fn snapshot(&self, host: &H) -> anyhow::Result<Value> {
        self(host)
    }
}

/// Latest snapshot, shared between the pump thread and readers.
pub struct SnapshotCell {
    current: RwLock<Arc<HostSnapshot>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(HostSnapshot::empty())),
        }
    }

    pub fn current(&self) -> Arc<HostSnapshot> {
        self.current.read().clone()
    }

    /// Replace the snapshot with `data`, bumping the version.
    pub fn update(&self, data: Value) -> Arc<HostSnapshot> {
        let mut current = self.current.write();
        let next = Arc::new(HostSnapshot {
            version: current.version + 1,
            taken_at: Utc::now(),
            data,
        });
        *current = next.clone();
        next
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
