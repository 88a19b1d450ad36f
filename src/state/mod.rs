//! State managers: the owners of every networked game object
//!
//! The authoritative manager runs on the server and decides what happened.
//! The replica manager runs on each client and mirrors it, predicting the
//! local player's ship in between snapshots.

pub mod assets;
pub mod authoritative;
pub mod objects;
pub mod replica;

pub use assets::{AssetError, AssetManager, AttachmentTracker, ModelHandle};
pub use authoritative::{AuthoritativeStateManager, StepReport};
pub use objects::ObjectSet;
pub use replica::{ReplicaEvent, ReplicaStateManager, ReplicaStepReport, SnapshotOutcome};

use std::collections::HashMap;

use crate::control::{ControllerFactory, ControllerRegistry, RegistryError};
use crate::game::{GameObject, ObjectId, ObjectType};

use objects::Entry;

/// Builds the object for a freshly assigned id
pub type ObjectConstructor = fn(ObjectId) -> GameObject;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("object {0} already exists")]
    DuplicateId(ObjectId),

    #[error("unknown object {0}")]
    UnknownId(ObjectId),

    #[error("object type {0:?} is not registered")]
    UnregisteredType(ObjectType),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Asset(#[from] AssetError),
}

/// Everything a manager needs to create objects of one type
#[derive(Debug, Clone)]
pub struct TypeRegistration {
    pub constructor: ObjectConstructor,
    pub factory: ControllerFactory,
    pub asset_key: String,
}

/// Registered types plus the default used when a caller names none
#[derive(Debug, Default)]
pub(crate) struct TypeTable {
    types: HashMap<ObjectType, TypeRegistration>,
    default_type: ObjectType,
}

impl TypeTable {
    pub(crate) fn register(&mut self, object_type: ObjectType, registration: TypeRegistration) {
        self.types.insert(object_type, registration);
    }

    pub(crate) fn set_default(&mut self, object_type: ObjectType) {
        self.default_type = object_type;
    }

    pub(crate) fn default_type(&self) -> ObjectType {
        self.default_type
    }

    pub(crate) fn get(&self, object_type: ObjectType) -> Result<&TypeRegistration, StateError> {
        self.types
            .get(&object_type)
            .ok_or(StateError::UnregisteredType(object_type))
    }

    /// Build a complete entry. The asset is attached last so a failed
    /// construction never leaves a model behind.
    pub(crate) fn build_entry<A: AssetManager>(
        &self,
        registry: &ControllerRegistry,
        assets: &mut A,
        id: ObjectId,
        object_type: ObjectType,
        factory: ControllerFactory,
    ) -> Result<Entry, StateError> {
        let registration = self.get(object_type)?;
        let object = (registration.constructor)(id);
        let bound = factory.create(registry, id, object_type)?;
        let asset = assets.get_3d_asset(&registration.asset_key)?;
        Ok(Entry {
            object,
            controller: bound.controller,
            sequence: bound.sequence,
            asset: Some(asset),
        })
    }
}

/// Default constructor for ships
pub fn space_fighter(id: ObjectId) -> GameObject {
    GameObject::new(id, ObjectType::SpaceFighter)
}

/// Default constructor for asteroids
pub fn asteroid(id: ObjectId) -> GameObject {
    GameObject::new(id, ObjectType::Asteroid)
}

/// Asset key conventionally used for each type
pub fn default_asset_key(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::SpaceFighter => "space_fighter",
        ObjectType::Asteroid => "asteroid",
    }
}
