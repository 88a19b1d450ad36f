//! Authoritative controller: applies received input in tick order

use std::collections::BTreeMap;

use tracing::debug;

use crate::game::physics::PhysicsSystem;
use crate::game::{ControlState, FlightStats, GameObject, InputFrame, ObjectState, ObjectType};

use super::{
    emit_trigger, ensure_finite, Controller, ControllerError, ControllerEvent, ControllerKind,
    TickContext,
};

/// Source of truth for one object on the authority.
///
/// Input frames are applied one per step in tick order and never twice.
/// Frames at or below the last applied tick are discarded on arrival. When
/// more than `max_backlog` frames are queued the surplus is applied in
/// order within the same step, each frame integrating physics and pulling
/// the trigger as it would have on its own step.
pub struct AuthoritativeController {
    stats: FlightStats,
    pending: BTreeMap<u64, InputFrame>,
    last_applied: Option<u64>,
    control: ControlState,
    max_backlog: usize,
}

impl AuthoritativeController {
    pub fn new(object_type: ObjectType, max_backlog: usize) -> Self {
        Self {
            stats: FlightStats::for_type(object_type),
            pending: BTreeMap::new(),
            last_applied: None,
            control: ControlState::default(),
            max_backlog,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn apply_next(&mut self, object: &GameObject, ctx: &mut TickContext<'_>) -> Result<(), ControllerError> {
        let Some((tick, frame)) = self.pending.pop_first() else {
            return Ok(());
        };
        self.last_applied = Some(tick);
        if !frame.is_valid() {
            return Err(ControllerError::InvalidIntent { tick });
        }
        self.control = ControlState::from_intents(&frame.intents);
        ctx.emit(ControllerEvent::InputApplied {
            object: object.id(),
            tick,
        });
        Ok(())
    }
}

impl Controller for AuthoritativeController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Authoritative
    }

    fn update(
        &mut self,
        object: &mut GameObject,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ControllerError> {
        let surplus = self.pending.len().saturating_sub(self.max_backlog);
        for _ in 0..surplus.max(1) {
            self.apply_next(object, ctx)?;
            PhysicsSystem::apply_controls(object, &self.control, &self.stats, ctx.delta);
            object.firing = self.control.fire;
            ensure_finite(object)?;
            emit_trigger(object, self.stats.muzzle_offset, ctx);
        }
        Ok(())
    }

    fn apply_remote_state(&mut self, object: &mut GameObject, _state: &ObjectState) {
        debug!(object_id = %object.id(), "Authority ignores remote state");
    }

    fn queue_input(&mut self, frames: Vec<InputFrame>) {
        for frame in frames {
            if self.last_applied.is_some_and(|last| frame.tick <= last) {
                debug!(tick = frame.tick, "Dropping stale input frame");
                continue;
            }
            self.pending.entry(frame.tick).or_insert(frame);
        }
    }

    fn last_applied_input(&self) -> Option<u64> {
        self.last_applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Intent, ObjectId};
    use proptest::prelude::*;

    fn run_step(controller: &mut AuthoritativeController, ship: &mut GameObject, tick: u64) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        let mut ctx = TickContext::new(tick, 1.0 / 60.0, &mut events);
        controller.update(ship, &mut ctx).expect("update");
        events
    }

    fn applied(events: &[ControllerEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::InputApplied { tick, .. } => Some(*tick),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn applies_one_frame_per_step_in_order() {
        let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 8);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        controller.queue_input(vec![
            InputFrame::new(3, vec![]),
            InputFrame::new(1, vec![]),
            InputFrame::new(2, vec![Intent::Fire]),
        ]);

        assert_eq!(applied(&run_step(&mut controller, &mut ship, 1)), vec![1]);
        let second = run_step(&mut controller, &mut ship, 2);
        assert_eq!(applied(&second), vec![2]);
        assert!(second
            .iter()
            .any(|e| matches!(e, ControllerEvent::TriggerHeld { .. })));
        assert_eq!(applied(&run_step(&mut controller, &mut ship, 3)), vec![3]);
        assert!(applied(&run_step(&mut controller, &mut ship, 4)).is_empty());
        assert_eq!(controller.last_applied_input(), Some(3));
    }

    #[test]
    fn late_frames_are_not_replayed() {
        let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 8);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        controller.queue_input(vec![InputFrame::new(5, vec![])]);
        run_step(&mut controller, &mut ship, 1);

        controller.queue_input(vec![InputFrame::new(4, vec![]), InputFrame::new(5, vec![])]);
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn backlog_surplus_is_applied_in_one_step() {
        let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 2);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        controller.queue_input((1..=5).map(|t| InputFrame::new(t, vec![])).collect());

        assert_eq!(applied(&run_step(&mut controller, &mut ship, 1)), vec![1, 2, 3]);
        assert_eq!(controller.pending(), 2);
    }

    #[test]
    fn fire_inside_a_surplus_batch_still_pulls_the_trigger() {
        let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 2);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        controller.queue_input(
            (1..=5)
                .map(|t| InputFrame::new(t, if t == 2 { vec![Intent::Fire] } else { vec![] }))
                .collect(),
        );

        let events = run_step(&mut controller, &mut ship, 1);
        assert_eq!(applied(&events), vec![1, 2, 3]);
        let triggers = events
            .iter()
            .filter(|e| matches!(e, ControllerEvent::TriggerHeld { .. }))
            .count();
        assert_eq!(triggers, 1);
        assert!(!ship.firing);
    }

    #[test]
    fn surplus_batch_moves_the_ship_like_separate_steps() {
        let frames = || -> Vec<InputFrame> {
            (1..=5)
                .map(|t| InputFrame::new(t, vec![Intent::Yaw(1.0), Intent::Pitch(0.5)]))
                .collect()
        };

        let mut batched = AuthoritativeController::new(ObjectType::SpaceFighter, 2);
        let mut batched_ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        batched.queue_input(frames());
        run_step(&mut batched, &mut batched_ship, 1);

        let mut stepped = AuthoritativeController::new(ObjectType::SpaceFighter, 8);
        let mut stepped_ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        stepped.queue_input(frames().into_iter().take(3).collect());
        for tick in 1..=3 {
            run_step(&mut stepped, &mut stepped_ship, tick);
        }

        assert!((batched_ship.position - stepped_ship.position).length() < 1e-5);
        assert!(batched_ship.orientation().angle_between(stepped_ship.orientation()) < 1e-5);
    }

    #[test]
    fn invalid_frame_is_consumed_and_reported() {
        let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 8);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        controller.queue_input(vec![InputFrame::new(1, vec![Intent::Yaw(f32::NAN)])]);

        let mut events = Vec::new();
        let mut ctx = TickContext::new(1, 1.0 / 60.0, &mut events);
        assert!(matches!(
            controller.update(&mut ship, &mut ctx),
            Err(ControllerError::InvalidIntent { tick: 1 })
        ));
        assert_eq!(controller.last_applied_input(), Some(1));
    }

    proptest! {
        #[test]
        fn never_applies_a_tick_twice(
            batches in prop::collection::vec(prop::collection::vec(1u64..60, 0..6), 1..20),
        ) {
            let mut controller = AuthoritativeController::new(ObjectType::SpaceFighter, 4);
            let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
            let mut seen = Vec::new();

            for (step, batch) in batches.into_iter().enumerate() {
                controller.queue_input(batch.into_iter().map(|t| InputFrame::new(t, vec![])).collect());
                seen.extend(applied(&run_step(&mut controller, &mut ship, step as u64 + 1)));
            }

            prop_assert!(seen.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
