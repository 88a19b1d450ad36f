//! Remote-replica controller: interpolates between snapshots

use glam::{Quat, Vec3};

use crate::game::{FlightStats, GameObject, ObjectState, ObjectType};

use super::registry::ReplicaRecipe;
use super::{emit_trigger, Controller, ControllerError, ControllerKind, TickContext};

/// Smooths another player's object toward the latest snapshot.
///
/// No physics is integrated locally; position and orientation move from
/// where the object was when the snapshot arrived to the snapshot value
/// over `interpolation_ticks` steps, then hold.
pub struct RemoteReplicaController {
    muzzle_offset: f32,
    interpolation_ticks: u32,
    from_position: Vec3,
    from_orientation: Quat,
    target: Option<ObjectState>,
    progress: u32,
}

impl RemoteReplicaController {
    pub fn new(object_type: ObjectType, recipe: &ReplicaRecipe) -> Self {
        Self {
            muzzle_offset: FlightStats::for_type(object_type).muzzle_offset,
            interpolation_ticks: recipe.interpolation_ticks.max(1),
            from_position: Vec3::ZERO,
            from_orientation: Quat::IDENTITY,
            target: None,
            progress: 0,
        }
    }
}

impl Controller for RemoteReplicaController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::RemoteReplica
    }

    fn update(
        &mut self,
        object: &mut GameObject,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ControllerError> {
        if let Some(target) = &self.target {
            if self.progress < self.interpolation_ticks {
                self.progress += 1;
                let t = self.progress as f32 / self.interpolation_ticks as f32;
                object.position = self.from_position.lerp(target.position, t);
                object.set_orientation(self.from_orientation.slerp(target.orientation, t));
            }
        }

        emit_trigger(object, self.muzzle_offset, ctx);
        Ok(())
    }

    fn apply_remote_state(&mut self, object: &mut GameObject, state: &ObjectState) {
        self.from_position = object.position;
        self.from_orientation = object.orientation();
        self.progress = 0;

        object.speed = state.speed;
        object.angular_velocity = state.angular_velocity;
        object.health = state.health;
        object.firing = state.firing;

        self.target = Some(state.clone());
    }
}
