//! Local-predicted controller for the player's own ship

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::game::physics::PhysicsSystem;
use crate::game::{ControlState, FlightStats, GameObject, InputFrame, ObjectState, ObjectType};

use super::registry::PredictionRecipe;
use super::{emit_trigger, ensure_finite, Controller, ControllerError, ControllerKind, TickContext};

#[derive(Debug, Clone, Copy)]
struct PredictedInput {
    tick: u64,
    control: ControlState,
    delta: f32,
}

/// Applies local input immediately and reconciles against the authority.
///
/// Every applied input is kept until the authority acknowledges it. On a
/// snapshot the authoritative state is rewound into a scratch copy, the
/// unacknowledged inputs are replayed on top of it, and the live object is
/// blended toward (or snapped to) the replayed result. Both sides of the
/// blend contain every locally applied input.
pub struct LocalPredictedController {
    stats: FlightStats,
    pending: Option<InputFrame>,
    control: ControlState,
    history: VecDeque<PredictedInput>,
    history_capacity: usize,
    blend: f32,
    snap_distance: f32,
    last_acked: Option<u64>,
    last_error: f32,
}

impl LocalPredictedController {
    pub fn new(object_type: ObjectType, recipe: &PredictionRecipe) -> Self {
        Self {
            stats: FlightStats::for_type(object_type),
            pending: None,
            control: ControlState::default(),
            history: VecDeque::with_capacity(recipe.history_capacity),
            history_capacity: recipe.history_capacity.max(1),
            blend: recipe.reconcile_blend,
            snap_distance: recipe.reconcile_snap_distance,
            last_acked: None,
            last_error: 0.0,
        }
    }

    /// Inputs applied locally but not yet acknowledged
    pub fn unacknowledged(&self) -> usize {
        self.history.len()
    }

    /// Position error measured at the last reconciliation
    pub fn last_error(&self) -> f32 {
        self.last_error
    }
}

impl Controller for LocalPredictedController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::LocalPredicted
    }

    fn update(
        &mut self,
        object: &mut GameObject,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ControllerError> {
        let tick = match self.pending.take() {
            Some(frame) => {
                if !frame.is_valid() {
                    return Err(ControllerError::InvalidIntent { tick: frame.tick });
                }
                self.control = ControlState::from_intents(&frame.intents);
                frame.tick
            }
            None => ctx.tick,
        };

        PhysicsSystem::apply_controls(object, &self.control, &self.stats, ctx.delta);
        object.firing = self.control.fire;
        ensure_finite(object)?;

        if self.history.len() == self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(PredictedInput {
            tick,
            control: self.control,
            delta: ctx.delta,
        });

        emit_trigger(object, self.stats.muzzle_offset, ctx);
        Ok(())
    }

    fn apply_remote_state(&mut self, object: &mut GameObject, state: &ObjectState) {
        object.health = state.health;

        if let Some(ack) = state.last_input_tick {
            if self.last_acked.is_some_and(|last| ack < last) {
                trace!(ack, "Ignoring older acknowledgement");
                return;
            }
            self.last_acked = Some(ack);
            while self.history.front().is_some_and(|entry| entry.tick <= ack) {
                self.history.pop_front();
            }
        }

        let mut replayed = object.clone();
        replayed.apply_state(state);
        for entry in &self.history {
            PhysicsSystem::apply_controls(&mut replayed, &entry.control, &self.stats, entry.delta);
        }

        let error = replayed.position - object.position;
        self.last_error = error.length();
        if !replayed.is_finite() {
            debug!(object_id = %object.id(), "Replayed state is not finite, keeping prediction");
            return;
        }

        if self.last_error > self.snap_distance {
            debug!(object_id = %object.id(), error = self.last_error, "Snapping predicted ship");
            object.position = replayed.position;
            object.set_orientation(replayed.orientation());
        } else {
            object.position += error * self.blend;
            object.set_orientation(object.orientation().slerp(replayed.orientation(), self.blend));
        }
        object.speed = replayed.speed;
        object.angular_velocity = replayed.angular_velocity;
    }

    fn queue_input(&mut self, frames: Vec<InputFrame>) {
        if let Some(frame) = frames.into_iter().last() {
            self.pending = Some(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Intent, ObjectId};
    use glam::Vec3;

    const DELTA: f32 = 1.0 / 60.0;

    fn recipe() -> PredictionRecipe {
        PredictionRecipe {
            projectiles: None,
            history_capacity: 64,
            reconcile_blend: 0.5,
            reconcile_snap_distance: 4.0,
        }
    }

    fn fly(controller: &mut LocalPredictedController, ship: &mut GameObject, ticks: std::ops::RangeInclusive<u64>) -> Vec<ObjectState> {
        let mut states = Vec::new();
        for tick in ticks {
            controller.queue_input(vec![InputFrame::new(tick, vec![Intent::Yaw(0.8), Intent::Pitch(-0.3)])]);
            let mut events = Vec::new();
            let mut ctx = TickContext::new(tick, DELTA, &mut events);
            controller.update(ship, &mut ctx).expect("update");
            states.push(ship.state());
        }
        states
    }

    #[test]
    fn matching_authority_leaves_prediction_untouched() {
        let mut controller = LocalPredictedController::new(ObjectType::SpaceFighter, &recipe());
        let mut ship = GameObject::new(ObjectId(7), ObjectType::SpaceFighter);
        let states = fly(&mut controller, &mut ship, 1..=10);
        let predicted = ship.position;

        // Authority confirms tick 5 exactly as predicted
        let mut acked = states[4].clone();
        acked.last_input_tick = Some(5);
        controller.apply_remote_state(&mut ship, &acked);

        assert_eq!(controller.unacknowledged(), 5);
        assert!((ship.position - predicted).length() < 1e-3);
    }

    #[test]
    fn unacknowledged_inputs_survive_a_correction() {
        let mut controller = LocalPredictedController::new(ObjectType::SpaceFighter, &recipe());
        let mut ship = GameObject::new(ObjectId(7), ObjectType::SpaceFighter);
        let states = fly(&mut controller, &mut ship, 1..=10);

        // Authority saw the ship slightly offset at tick 5
        let mut acked = states[4].clone();
        acked.position += Vec3::new(1.0, 0.0, 0.0);
        acked.last_input_tick = Some(5);
        let before = ship.position;
        controller.apply_remote_state(&mut ship, &acked);

        // Blended halfway toward authority + replayed inputs, never back to tick 5
        let moved = ship.position - before;
        assert!((moved - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-3);
        assert!((ship.position - states[4].position).length() > 0.5);
    }

    #[test]
    fn large_error_snaps() {
        let mut controller = LocalPredictedController::new(ObjectType::SpaceFighter, &recipe());
        let mut ship = GameObject::new(ObjectId(7), ObjectType::SpaceFighter);
        let states = fly(&mut controller, &mut ship, 1..=4);

        let mut acked = states[3].clone();
        acked.position += Vec3::new(0.0, 50.0, 0.0);
        acked.last_input_tick = Some(4);
        controller.apply_remote_state(&mut ship, &acked);

        assert!((ship.position - acked.position).length() < 1e-4);
        assert_eq!(controller.unacknowledged(), 0);
    }

    #[test]
    fn older_acknowledgement_is_ignored() {
        let mut controller = LocalPredictedController::new(ObjectType::SpaceFighter, &recipe());
        let mut ship = GameObject::new(ObjectId(7), ObjectType::SpaceFighter);
        let states = fly(&mut controller, &mut ship, 1..=6);

        let mut newer = states[4].clone();
        newer.last_input_tick = Some(5);
        controller.apply_remote_state(&mut ship, &newer);
        let position = ship.position;

        let mut older = states[1].clone();
        older.position += Vec3::splat(3.0);
        older.last_input_tick = Some(2);
        controller.apply_remote_state(&mut ship, &older);

        assert_eq!(ship.position, position);
    }
}
