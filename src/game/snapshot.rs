//! Snapshot building

use serde::{Deserialize, Serialize};

use super::object::ObjectState;
use super::ObjectId;

/// Authoritative world state at one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server tick number (monotonically increasing)
    pub tick: u64,
    /// Objects present at this tick, in manager insertion order
    pub objects: Vec<ObjectState>,
    /// Objects destroyed since the previous snapshot
    pub destroyed: Vec<ObjectId>,
}

impl Snapshot {
    pub fn object(&self, id: ObjectId) -> Option<&ObjectState> {
        self.objects.iter().find(|state| state.id == id)
    }
}

/// Builds snapshots at a fixed tick cadence
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
    /// Destroyed ids not yet reported
    pending_destroyed: Vec<ObjectId>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            pending_destroyed: Vec::new(),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Remember a destroyed object for the next snapshot
    pub fn record_destroyed(&mut self, id: ObjectId) {
        if !self.pending_destroyed.contains(&id) {
            self.pending_destroyed.push(id);
        }
    }

    /// Build a full snapshot, consuming the pending destroyed list
    pub fn build(&mut self, tick: u64, objects: Vec<ObjectState>) -> Snapshot {
        Snapshot {
            tick,
            objects,
            destroyed: std::mem::take(&mut self.pending_destroyed),
        }
    }
}

/// Snapshot size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_objects_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, object_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_objects_per_snapshot =
            self.avg_objects_per_snapshot * ((n - 1.0) / n) + (object_count as f32 / n);
    }
}
