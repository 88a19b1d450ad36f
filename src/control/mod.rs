//! Controllers: the behavior units that drive one game object each tick

pub mod authoritative;
pub mod local;
pub mod projectile;
pub mod registry;
pub mod remote;

pub use authoritative::AuthoritativeController;
pub use local::LocalPredictedController;
pub use projectile::{HitTestPolicy, ProjectileSequenceController};
pub use registry::{
    AuthorityRecipe, BoundController, ControllerFactory, ControllerKey, ControllerRecipe,
    ControllerRegistry, PredictionRecipe, RegistryError, ReplicaRecipe,
};
pub use remote::RemoteReplicaController;

use glam::Vec3;

use crate::game::{GameObject, InputFrame, ObjectId, ObjectState};

/// Controller variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    LocalPredicted,
    RemoteReplica,
    Authoritative,
    Sequence,
}

/// Side effects a controller asks its manager to carry out after the update pass
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// The object's trigger is held; its projectile sequence decides whether a round leaves
    TriggerHeld {
        origin: ObjectId,
        muzzle: Vec3,
        direction: Vec3,
    },
    /// An input frame was applied to the object
    InputApplied { object: ObjectId, tick: u64 },
}

/// Per-step data handed to every controller
pub struct TickContext<'a> {
    pub tick: u64,
    /// Step length in seconds
    pub delta: f32,
    pub events: &'a mut Vec<ControllerEvent>,
}

impl<'a> TickContext<'a> {
    pub fn new(tick: u64, delta: f32, events: &'a mut Vec<ControllerEvent>) -> Self {
        Self { tick, delta, events }
    }

    pub fn emit(&mut self, event: ControllerEvent) {
        self.events.push(event);
    }
}

/// Errors raised while updating a single object
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("input frame for tick {tick} carries a non-finite intent")]
    InvalidIntent { tick: u64 },

    #[error("object {0} reached a non-finite state")]
    NonFiniteState(ObjectId),
}

/// Drives one game object, from local input or from remote state.
///
/// A controller is bound to a single object for its whole life; the
/// manager owning the object lends it for the duration of each call.
pub trait Controller: Send {
    fn kind(&self) -> ControllerKind;

    /// Advance the bound object by one step
    fn update(
        &mut self,
        object: &mut GameObject,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ControllerError>;

    /// Take in an authoritative state record for the bound object
    fn apply_remote_state(&mut self, object: &mut GameObject, state: &ObjectState);

    /// Queue input frames; controllers that do not consume input ignore them
    fn queue_input(&mut self, _frames: Vec<InputFrame>) {}

    /// Newest input tick applied to the object, if this controller tracks one
    fn last_applied_input(&self) -> Option<u64> {
        None
    }
}

/// Emit a trigger event from the object's muzzle when it is firing
pub(crate) fn emit_trigger(object: &GameObject, muzzle_offset: f32, ctx: &mut TickContext<'_>) {
    if object.firing {
        let direction = object.forward();
        ctx.emit(ControllerEvent::TriggerHeld {
            origin: object.id(),
            muzzle: object.position + direction * muzzle_offset,
            direction,
        });
    }
}

/// Shared post-update check used by the physics-driven controllers
pub(crate) fn ensure_finite(object: &GameObject) -> Result<(), ControllerError> {
    if object.is_finite() {
        Ok(())
    } else {
        Err(ControllerError::NonFiniteState(object.id()))
    }
}
