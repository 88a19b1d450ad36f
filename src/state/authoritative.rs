//! Authoritative state manager: the server's source of truth

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::{Controller, ControllerFactory, ControllerKey, ControllerRegistry};
use crate::game::combat::CombatSystem;
use crate::game::{
    GameObject, HitEvent, InputFrame, ObjectId, ObjectType, Snapshot, SnapshotBuilder,
};

use super::objects::{ObjectSet, SequenceHit};
use super::{
    asteroid, default_asset_key, space_fighter, AssetManager, ObjectConstructor, StateError,
    TypeRegistration, TypeTable,
};

/// Result of one authoritative step
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub tick: u64,
    /// Input frames applied across all objects
    pub applied_inputs: usize,
    pub shots: usize,
    pub expired_projectiles: usize,
    pub hits: Vec<HitEvent>,
    /// Objects destroyed by hits during this step
    pub destroyed: Vec<ObjectId>,
    /// Objects whose controller failed and were skipped
    pub failures: usize,
    /// Present on snapshot ticks
    pub snapshot: Option<Snapshot>,
}

/// Owns every object on the authority and decides hits and destruction
pub struct AuthoritativeStateManager<A: AssetManager> {
    registry: ControllerRegistry,
    types: TypeTable,
    objects: ObjectSet,
    assets: A,
    snapshots: SnapshotBuilder,
    tick: u64,
    next_id: u32,
    rng: ChaCha8Rng,
    spawn_radius: f32,
}

impl<A: AssetManager> AuthoritativeStateManager<A> {
    /// Empty manager with the standard controller wiring and no registered types
    pub fn new(config: &Config, assets: A) -> Self {
        Self {
            registry: ControllerRegistry::for_authority(config),
            types: TypeTable::default(),
            objects: ObjectSet::new(),
            assets,
            snapshots: SnapshotBuilder::new(config.packet_period_frames),
            tick: 0,
            next_id: 1,
            rng: ChaCha8Rng::seed_from_u64(config.spawn_seed),
            spawn_radius: config.spawn_radius,
        }
    }

    /// Manager with fighters and asteroids registered, fighters by default
    pub fn with_default_types(config: &Config, assets: A) -> Self {
        let mut manager = Self::new(config, assets);
        let factory = manager.registry.create_factory(ControllerKey::Authoritative);
        for (object_type, constructor) in [
            (ObjectType::SpaceFighter, space_fighter as ObjectConstructor),
            (ObjectType::Asteroid, asteroid as ObjectConstructor),
        ] {
            manager.register_game_object_type(
                object_type,
                constructor,
                factory,
                default_asset_key(object_type),
            );
        }
        manager.set_default_object_type(ObjectType::SpaceFighter);
        manager
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn objects(&self) -> &ObjectSet {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.registry
    }

    pub fn register_game_object_type(
        &mut self,
        object_type: ObjectType,
        constructor: ObjectConstructor,
        factory: ControllerFactory,
        asset_key: impl Into<String>,
    ) {
        self.types.register(
            object_type,
            TypeRegistration {
                constructor,
                factory,
                asset_key: asset_key.into(),
            },
        );
    }

    pub fn set_default_object_type(&mut self, object_type: ObjectType) {
        self.types.set_default(object_type);
    }

    /// Create an object of the default type driven by `factory`
    pub fn create_object_controller(
        &mut self,
        id: ObjectId,
        factory: ControllerFactory,
    ) -> Result<&mut dyn Controller, StateError> {
        let object_type = self.types.default_type();
        self.create_typed_object_controller(id, object_type, factory)
    }

    pub fn create_typed_object_controller(
        &mut self,
        id: ObjectId,
        object_type: ObjectType,
        factory: ControllerFactory,
    ) -> Result<&mut dyn Controller, StateError> {
        if self.objects.contains(id) {
            return Err(StateError::DuplicateId(id));
        }
        let entry =
            self.types
                .build_entry(&self.registry, &mut self.assets, id, object_type, factory)?;
        let entry = self.objects.insert(entry)?;
        debug!(object_id = %id, ?object_type, "Object created");
        Ok(entry.controller.as_mut())
    }

    /// Spawn an object of the default type and return its id
    pub fn spawn(&mut self) -> Result<ObjectId, StateError> {
        let object_type = self.types.default_type();
        self.spawn_typed(object_type)
    }

    /// Spawn with a fresh id; ids are never reused
    pub fn spawn_typed(&mut self, object_type: ObjectType) -> Result<ObjectId, StateError> {
        let factory = self.types.get(object_type)?.factory;
        while self.objects.contains(ObjectId(self.next_id)) {
            self.next_id += 1;
        }
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        self.create_typed_object_controller(id, object_type, factory)?;
        let offset = self.spawn_offset();
        if let Some(entry) = self.objects.entry_mut(id) {
            entry.object.position += offset;
        }
        self.snapshots.force_next();

        info!(object_id = %id, ?object_type, tick = self.tick, "Object spawned");
        Ok(id)
    }

    fn spawn_offset(&mut self) -> Vec3 {
        if !self.spawn_radius.is_finite() || self.spawn_radius <= 0.0 {
            return Vec3::ZERO;
        }
        let r = self.spawn_radius;
        Vec3::new(
            self.rng.gen_range(-r..=r),
            self.rng.gen_range(-r..=r),
            self.rng.gen_range(-r..=r),
        )
    }

    /// Queue input frames for an object's controller
    pub fn receive_input(
        &mut self,
        object_id: ObjectId,
        frames: Vec<InputFrame>,
    ) -> Result<(), StateError> {
        let entry = self
            .objects
            .entry_mut(object_id)
            .ok_or(StateError::UnknownId(object_id))?;
        entry.controller.queue_input(frames);
        Ok(())
    }

    /// Remove an object, release its model and report it in the next snapshot
    pub fn destroy(&mut self, id: ObjectId) -> Result<(), StateError> {
        let entry = self.objects.remove(id).ok_or(StateError::UnknownId(id))?;
        if let Some(handle) = entry.asset {
            if let Err(err) = self.assets.release(handle) {
                warn!(object_id = %id, error = %err, "Failed to release model");
            }
        }
        self.snapshots.record_destroyed(id);
        info!(object_id = %id, tick = self.tick, "Object destroyed");
        Ok(())
    }

    /// Advance the world by one fixed step
    pub fn step(&mut self, delta: f32) -> StepReport {
        self.tick += 1;
        let outcome = self.objects.simulate(self.tick, delta);

        let mut report = StepReport {
            tick: self.tick,
            applied_inputs: outcome.applied_inputs,
            shots: outcome.shots,
            expired_projectiles: outcome.expired,
            failures: outcome.failures,
            ..StepReport::default()
        };

        for hit in outcome.hits {
            if let Some(event) = self.resolve_hit(hit) {
                if event.target_destroyed {
                    report.destroyed.push(event.target_id);
                }
                report.hits.push(event);
            }
        }
        for id in &report.destroyed {
            if let Err(err) = self.destroy(*id) {
                warn!(object_id = %id, error = %err, "Failed to destroy object");
            }
        }

        if self.snapshots.should_send() {
            report.snapshot = Some(self.snapshot_now());
        }
        report
    }

    /// Apply a hit's damage; hits on an already dead target are ignored
    fn resolve_hit(&mut self, hit: SequenceHit) -> Option<HitEvent> {
        let entry = self.objects.entry_mut(hit.target)?;
        if entry.object.health <= 0.0 {
            return None;
        }
        let (health, dead) = CombatSystem::apply_damage(entry.object.health, hit.projectile.damage);
        entry.object.health = health;
        debug!(
            shooter = %hit.shooter,
            target = %hit.target,
            damage = hit.projectile.damage,
            health,
            "Hit confirmed"
        );
        Some(HitEvent {
            projectile_id: hit.projectile.id,
            shooter_id: hit.shooter,
            target_id: hit.target,
            damage: hit.projectile.damage,
            position: hit.projectile.position,
            target_destroyed: dead,
        })
    }

    /// Full snapshot of the current tick, outside the regular cadence
    pub fn snapshot_now(&mut self) -> Snapshot {
        self.snapshots.build(self.tick, self.objects.states())
    }
}
