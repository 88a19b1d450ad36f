//! Controller factory registry
//!
//! Recipes are registered under typed keys and only resolved when an object
//! is actually constructed, so a recipe may name a projectile sequence that
//! is registered after it.

use std::collections::HashMap;

use tracing::debug;

use crate::config::Config;
use crate::game::{ObjectId, ObjectType, WeaponStats};

use super::authoritative::AuthoritativeController;
use super::local::LocalPredictedController;
use super::projectile::{HitTestPolicy, ProjectileSequenceController};
use super::remote::RemoteReplicaController;
use super::Controller;

/// Keys under which recipes are registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKey {
    /// The local player's ship on a client
    PlayerShip,
    /// Objects a client learns about through snapshots
    RemoteReplica,
    /// Every object on the authority
    Authoritative,
    /// Gun rounds fired by a ship
    GunProjectiles,
}

impl std::fmt::Display for ControllerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecipe {
    pub projectiles: Option<ControllerKey>,
    pub history_capacity: usize,
    pub reconcile_blend: f32,
    pub reconcile_snap_distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaRecipe {
    pub projectiles: Option<ControllerKey>,
    pub interpolation_ticks: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityRecipe {
    pub projectiles: Option<ControllerKey>,
    pub max_input_backlog: usize,
}

/// How to build a controller and which collaborators it needs
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerRecipe {
    LocalPredicted(PredictionRecipe),
    RemoteReplica(ReplicaRecipe),
    Authoritative(AuthorityRecipe),
    ProjectileSequence(HitTestPolicy),
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("no controller recipe registered for {0}")]
    MissingDependency(ControllerKey),

    #[error("recipe {key} is not a {expected} recipe")]
    WrongRecipe {
        key: ControllerKey,
        expected: &'static str,
    },
}

/// A controller bound to one object, plus the projectile sequence it fires into
pub struct BoundController {
    pub controller: Box<dyn Controller>,
    pub sequence: Option<ProjectileSequenceController>,
}

/// Deferred constructor for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerFactory {
    key: ControllerKey,
}

impl ControllerFactory {
    pub fn key(&self) -> ControllerKey {
        self.key
    }

    /// Build a controller bound to `object_id`, resolving references now
    pub fn create(
        &self,
        registry: &ControllerRegistry,
        object_id: ObjectId,
        object_type: ObjectType,
    ) -> Result<BoundController, RegistryError> {
        registry.construct(self.key, object_id, object_type)
    }
}

/// Typed mapping from controller keys to recipes
#[derive(Debug, Default)]
pub struct ControllerRegistry {
    recipes: HashMap<ControllerKey, ControllerRecipe>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client-side wiring: player ship, remote replicas and their guns
    pub fn for_replica(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(
            ControllerKey::PlayerShip,
            ControllerRecipe::LocalPredicted(PredictionRecipe {
                projectiles: Some(ControllerKey::GunProjectiles),
                history_capacity: config.input_buffer_capacity,
                reconcile_blend: config.reconcile_blend,
                reconcile_snap_distance: config.reconcile_snap_distance,
            }),
        );
        registry.register(
            ControllerKey::RemoteReplica,
            ControllerRecipe::RemoteReplica(ReplicaRecipe {
                projectiles: Some(ControllerKey::GunProjectiles),
                interpolation_ticks: config.packet_period_frames,
            }),
        );
        registry.register(ControllerKey::GunProjectiles, Self::gun_recipe(config));
        registry
    }

    /// Server-side wiring: authoritative objects and their guns
    pub fn for_authority(config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(
            ControllerKey::Authoritative,
            ControllerRecipe::Authoritative(AuthorityRecipe {
                projectiles: Some(ControllerKey::GunProjectiles),
                max_input_backlog: config.max_input_backlog,
            }),
        );
        registry.register(ControllerKey::GunProjectiles, Self::gun_recipe(config));
        registry
    }

    fn gun_recipe(config: &Config) -> ControllerRecipe {
        ControllerRecipe::ProjectileSequence(if config.hit_test_exhaustive {
            HitTestPolicy::Exhaustive
        } else {
            HitTestPolicy::EarlyExit
        })
    }

    pub fn register(&mut self, key: ControllerKey, recipe: ControllerRecipe) {
        if self.recipes.insert(key, recipe).is_some() {
            debug!(key = %key, "Replacing controller recipe");
        }
    }

    /// Factory for `key`; the key does not need to be registered yet
    pub fn create_factory(&self, key: ControllerKey) -> ControllerFactory {
        ControllerFactory { key }
    }

    pub fn resolve(&self, key: ControllerKey) -> Result<&ControllerRecipe, RegistryError> {
        self.recipes
            .get(&key)
            .ok_or(RegistryError::MissingDependency(key))
    }

    pub fn contains(&self, key: ControllerKey) -> bool {
        self.recipes.contains_key(&key)
    }

    /// Build the controller for `key` bound to one object
    pub fn construct(
        &self,
        key: ControllerKey,
        object_id: ObjectId,
        object_type: ObjectType,
    ) -> Result<BoundController, RegistryError> {
        let (controller, projectiles) = match self.resolve(key)? {
            ControllerRecipe::LocalPredicted(recipe) => (
                Box::new(LocalPredictedController::new(object_type, recipe)) as Box<dyn Controller>,
                recipe.projectiles,
            ),
            ControllerRecipe::RemoteReplica(recipe) => (
                Box::new(RemoteReplicaController::new(object_type, recipe)) as Box<dyn Controller>,
                recipe.projectiles,
            ),
            ControllerRecipe::Authoritative(recipe) => (
                Box::new(AuthoritativeController::new(object_type, recipe.max_input_backlog))
                    as Box<dyn Controller>,
                recipe.projectiles,
            ),
            ControllerRecipe::ProjectileSequence(_) => {
                return Err(RegistryError::WrongRecipe {
                    key,
                    expected: "object controller",
                })
            }
        };

        let sequence = match projectiles {
            Some(sequence_key) => self.construct_sequence(sequence_key, object_id, object_type)?,
            None => None,
        };

        Ok(BoundController {
            controller,
            sequence,
        })
    }

    /// Build the projectile sequence for an object; unarmed types get none
    pub fn construct_sequence(
        &self,
        key: ControllerKey,
        origin: ObjectId,
        object_type: ObjectType,
    ) -> Result<Option<ProjectileSequenceController>, RegistryError> {
        match self.resolve(key)? {
            ControllerRecipe::ProjectileSequence(policy) => {
                let weapon = WeaponStats::for_type(object_type);
                Ok((weapon.range > 0.0)
                    .then(|| ProjectileSequenceController::new(origin, weapon, *policy)))
            }
            _ => Err(RegistryError::WrongRecipe {
                key,
                expected: "projectile sequence",
            }),
        }
    }
}
