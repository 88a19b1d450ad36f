//! Insertion-ordered object set shared by both managers

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::control::{
    Controller, ControllerEvent, ControllerKind, ProjectileSequenceController, TickContext,
};
use crate::game::{GameObject, HitVolume, ObjectId, ObjectState, Projectile};

use super::{ModelHandle, StateError};

/// One live object with the controller bound to it
pub(crate) struct Entry {
    pub(crate) object: GameObject,
    pub(crate) controller: Box<dyn Controller>,
    pub(crate) sequence: Option<ProjectileSequenceController>,
    pub(crate) asset: Option<ModelHandle>,
}

/// A round that struck an object during hit-testing
#[derive(Debug, Clone)]
pub(crate) struct SequenceHit {
    pub(crate) shooter: ObjectId,
    pub(crate) target: ObjectId,
    pub(crate) projectile: Projectile,
}

/// Totals from one simulation pass
#[derive(Debug, Default)]
pub(crate) struct PassOutcome {
    pub(crate) applied_inputs: usize,
    pub(crate) shots: usize,
    pub(crate) expired: usize,
    pub(crate) failures: usize,
    pub(crate) hits: Vec<SequenceHit>,
}

/// Objects in stable insertion order.
///
/// Iteration, snapshots and controller updates all follow the order in
/// which objects were inserted.
#[derive(Default)]
pub struct ObjectSet {
    order: Vec<ObjectId>,
    entries: HashMap<ObjectId, Entry>,
}

impl ObjectSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.entries.get(&id).map(|entry| &entry.object)
    }

    /// Objects in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| &entry.object))
    }

    pub fn controller_kind(&self, id: ObjectId) -> Option<ControllerKind> {
        self.entries.get(&id).map(|entry| entry.controller.kind())
    }

    pub fn sequence(&self, id: ObjectId) -> Option<&ProjectileSequenceController> {
        self.entries.get(&id).and_then(|entry| entry.sequence.as_ref())
    }

    /// Networked state of every object, with input acknowledgements
    pub fn states(&self) -> Vec<ObjectState> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| {
                let mut state = entry.object.state();
                state.last_input_tick = entry.controller.last_applied_input();
                state
            })
            .collect()
    }

    pub(crate) fn insert(&mut self, entry: Entry) -> Result<&mut Entry, StateError> {
        let id = entry.object.id();
        if self.entries.contains_key(&id) {
            return Err(StateError::DuplicateId(id));
        }
        self.order.push(id);
        Ok(self.entries.entry(id).or_insert(entry))
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<Entry> {
        let entry = self.entries.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(entry)
    }

    pub(crate) fn entry_mut(&mut self, id: ObjectId) -> Option<&mut Entry> {
        self.entries.get_mut(&id)
    }

    /// Run one step: controllers, firing, projectile flight, then hit-tests
    pub(crate) fn simulate(&mut self, tick: u64, delta: f32) -> PassOutcome {
        let mut outcome = PassOutcome::default();
        let mut events = Vec::new();

        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            let before = entry.object.clone();
            let mark = events.len();
            let mut ctx = TickContext::new(tick, delta, &mut events);
            if let Err(err) = entry.controller.update(&mut entry.object, &mut ctx) {
                warn!(object_id = %id, tick, error = %err, "Controller update failed");
                entry.object = before;
                events.truncate(mark);
                outcome.failures += 1;
            }
        }

        for event in events {
            match event {
                ControllerEvent::InputApplied { .. } => outcome.applied_inputs += 1,
                ControllerEvent::TriggerHeld {
                    origin,
                    muzzle,
                    direction,
                } => {
                    let fired = self
                        .entries
                        .get_mut(&origin)
                        .and_then(|entry| entry.sequence.as_mut())
                        .and_then(|sequence| sequence.fire(muzzle, direction, tick));
                    if let Some(projectile_id) = fired {
                        trace!(object_id = %origin, projectile_id, "Round fired");
                        outcome.shots += 1;
                    }
                }
            }
        }

        // Sequences are controllers of their origin object
        let mut sink = Vec::new();
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else {
                continue;
            };
            if let Some(sequence) = entry.sequence.as_mut() {
                let before = sequence.expired();
                let mut ctx = TickContext::new(tick, delta, &mut sink);
                if let Err(err) = sequence.update(&mut entry.object, &mut ctx) {
                    warn!(object_id = %id, error = %err, "Projectile sequence update failed");
                    outcome.failures += 1;
                }
                outcome.expired += (sequence.expired() - before) as usize;
            }
        }

        outcome.hits = self.hit_test();
        outcome
    }

    /// Test every sequence against every other object
    fn hit_test(&mut self) -> Vec<SequenceHit> {
        let volumes: Vec<(ObjectId, HitVolume)> = self
            .order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| (entry.object.id(), HitVolume::of(&entry.object)))
            .collect();

        let mut hits = Vec::new();
        for shooter in &self.order {
            let Some(sequence) = self
                .entries
                .get_mut(shooter)
                .and_then(|entry| entry.sequence.as_mut())
            else {
                continue;
            };
            if sequence.is_empty() {
                continue;
            }
            for (target, volume) in &volumes {
                if target == shooter {
                    continue;
                }
                if let Some(struck) = sequence.find_hits_with_object(volume) {
                    hits.extend(struck.into_iter().map(|projectile| SequenceHit {
                        shooter: *shooter,
                        target: *target,
                        projectile,
                    }));
                }
            }
        }
        hits
    }
}
