//! Game simulation modules

pub mod combat;
pub mod geometry;
pub mod input;
pub mod object;
pub mod physics;
pub mod snapshot;
pub mod timestep;

pub use combat::{HitEvent, Projectile, ProjectileState, WeaponStats};
pub use geometry::{HitVolume, Proximity};
pub use input::{ControlState, InputFrame, InputGatherer, Intent, IntentSource, ScriptedIntents};
pub use object::{GameObject, ObjectState};
pub use physics::FlightStats;
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotStats};
pub use timestep::FixedTimestep;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned object identifier, unique for the object's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ObjectId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Networked object types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// Player-controlled fighter
    SpaceFighter,
    /// Passive drifting target
    Asteroid,
}

impl Default for ObjectType {
    fn default() -> Self {
        Self::SpaceFighter
    }
}
