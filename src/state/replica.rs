//! Replica state manager: the client's mirror of the authority

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::{
    Controller, ControllerFactory, ControllerKey, ControllerKind, ControllerRegistry,
};
use crate::game::{GameObject, HitEvent, InputFrame, ObjectId, ObjectType, Snapshot};

use super::objects::ObjectSet;
use super::{
    asteroid, default_asset_key, space_fighter, AssetManager, ObjectConstructor, StateError,
    TypeRegistration, TypeTable,
};

/// What happened to an incoming snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotOutcome {
    Applied {
        created: usize,
        updated: usize,
        removed: usize,
        /// Objects that could not be created from the snapshot
        failed: usize,
    },
    /// Tick at or below the last applied one
    Stale,
    /// The replica is disconnected and no longer follows the authority
    Ignored,
}

/// Connection-level events surfaced to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaEvent {
    Disconnected,
}

/// Result of one replica step
#[derive(Debug, Clone, Default)]
pub struct ReplicaStepReport {
    pub tick: u64,
    pub shots: usize,
    /// Local hits; these only remove rounds, damage comes from the authority
    pub hits: Vec<HitEvent>,
    pub failures: usize,
}

/// Owns the client's objects and keeps them in line with snapshots
pub struct ReplicaStateManager<A: AssetManager> {
    registry: ControllerRegistry,
    types: TypeTable,
    replica_factories: HashMap<ObjectType, ControllerFactory>,
    objects: ObjectSet,
    assets: A,
    player: Option<ObjectId>,
    /// The player object has appeared in an applied snapshot
    player_confirmed: bool,
    last_snapshot_tick: Option<u64>,
    stale_snapshots: u64,
    connected: bool,
    disconnect_reported: bool,
}

impl<A: AssetManager> ReplicaStateManager<A> {
    pub fn new(config: &Config, assets: A) -> Self {
        Self {
            registry: ControllerRegistry::for_replica(config),
            types: TypeTable::default(),
            replica_factories: HashMap::new(),
            objects: ObjectSet::new(),
            assets,
            player: None,
            player_confirmed: false,
            last_snapshot_tick: None,
            stale_snapshots: 0,
            connected: true,
            disconnect_reported: false,
        }
    }

    /// Manager with both types registered and remote objects replicated
    pub fn with_default_types(config: &Config, assets: A) -> Self {
        let mut manager = Self::new(config, assets);
        let player = manager.registry.create_factory(ControllerKey::PlayerShip);
        let remote = manager.registry.create_factory(ControllerKey::RemoteReplica);
        for (object_type, constructor) in [
            (ObjectType::SpaceFighter, space_fighter as ObjectConstructor),
            (ObjectType::Asteroid, asteroid as ObjectConstructor),
        ] {
            manager.register_game_object_type(
                object_type,
                constructor,
                player,
                default_asset_key(object_type),
            );
            manager.associate_controller_factory_with_game_object_type(object_type, remote);
        }
        manager.set_default_object_type(ObjectType::SpaceFighter);
        manager
    }

    pub fn objects(&self) -> &ObjectSet {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains(id)
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

    pub fn player(&self) -> Option<ObjectId> {
        self.player
    }

    pub fn last_snapshot_tick(&self) -> Option<u64> {
        self.last_snapshot_tick
    }

    pub fn stale_snapshots(&self) -> u64 {
        self.stale_snapshots
    }

    pub fn is_connected(&self) -> bool {
        self.connected
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

    /// Factory used for objects of `object_type` first seen in a snapshot
    pub fn associate_controller_factory_with_game_object_type(
        &mut self,
        object_type: ObjectType,
        factory: ControllerFactory,
    ) {
        self.replica_factories.insert(object_type, factory);
    }

    /// Create a local object of the default type
    pub fn create_object_controller(
        &mut self,
        id: ObjectId,
        factory: ControllerFactory,
    ) -> Result<&mut dyn Controller, StateError> {
        if self.objects.contains(id) {
            return Err(StateError::DuplicateId(id));
        }
        let object_type = self.types.default_type();
        let entry =
            self.types
                .build_entry(&self.registry, &mut self.assets, id, object_type, factory)?;
        let entry = self.objects.insert(entry)?;
        debug!(object_id = %id, ?object_type, "Local object created");
        Ok(entry.controller.as_mut())
    }

    /// Swap the controller of an existing object, keeping its state and model
    pub fn rebind_controller(
        &mut self,
        id: ObjectId,
        factory: ControllerFactory,
    ) -> Result<&mut dyn Controller, StateError> {
        let entry = self
            .objects
            .entry_mut(id)
            .ok_or(StateError::UnknownId(id))?;
        let bound = factory.create(&self.registry, id, entry.object.object_type())?;
        entry.controller = bound.controller;
        entry.sequence = bound.sequence;
        debug!(object_id = %id, key = %factory.key(), "Controller rebound");
        Ok(entry.controller.as_mut())
    }

    /// Mark the object driven by the local player
    pub fn specify_player_controller_and_controlled_object(
        &mut self,
        id: ObjectId,
    ) -> Result<(), StateError> {
        if !self.objects.contains(id) {
            return Err(StateError::UnknownId(id));
        }
        info!(object_id = %id, "Player object assigned");
        self.player = Some(id);
        self.player_confirmed = false;
        Ok(())
    }

    /// Bring the local world in line with an authoritative snapshot
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> SnapshotOutcome {
        if !self.connected {
            return SnapshotOutcome::Ignored;
        }
        if self.last_snapshot_tick.is_some_and(|last| snapshot.tick <= last) {
            self.stale_snapshots += 1;
            debug!(tick = snapshot.tick, last = ?self.last_snapshot_tick, "Stale snapshot ignored");
            return SnapshotOutcome::Stale;
        }
        self.last_snapshot_tick = Some(snapshot.tick);

        let (mut created, mut updated, mut removed, mut failed) = (0, 0, 0, 0);

        for state in &snapshot.objects {
            if let Some(entry) = self.objects.entry_mut(state.id) {
                entry.controller.apply_remote_state(&mut entry.object, state);
                updated += 1;
                continue;
            }

            let Some(factory) = self.replica_factories.get(&state.object_type).copied() else {
                warn!(object_id = %state.id, object_type = ?state.object_type, "No replica factory for type");
                failed += 1;
                continue;
            };
            let built = self.types.build_entry(
                &self.registry,
                &mut self.assets,
                state.id,
                state.object_type,
                factory,
            );
            match built {
                Ok(mut entry) => {
                    entry.object.apply_state(state);
                    entry.controller.apply_remote_state(&mut entry.object, state);
                    if self.objects.insert(entry).is_ok() {
                        debug!(object_id = %state.id, "Replica created from snapshot");
                        created += 1;
                    }
                }
                Err(err) => {
                    warn!(object_id = %state.id, error = %err, "Failed to create replica");
                    failed += 1;
                }
            }
        }

        for id in &snapshot.destroyed {
            if self.remove(*id) {
                removed += 1;
            }
        }

        // Snapshots carry the full world, so anything missing was destroyed in
        // a snapshot that never arrived. The player's ship is exempt until the
        // authority has listed it once, since it is created locally first.
        let listed: HashSet<ObjectId> = snapshot.objects.iter().map(|state| state.id).collect();
        if let Some(player) = self.player {
            self.player_confirmed |= listed.contains(&player);
        }
        let absent: Vec<ObjectId> = self
            .objects
            .ids()
            .iter()
            .copied()
            .filter(|id| !listed.contains(id))
            .filter(|id| self.player_confirmed || self.player != Some(*id))
            .collect();
        for id in absent {
            debug!(object_id = %id, tick = snapshot.tick, "Object missing from snapshot, removing");
            if self.remove(id) {
                removed += 1;
            }
        }

        SnapshotOutcome::Applied {
            created,
            updated,
            removed,
            failed,
        }
    }

    fn remove(&mut self, id: ObjectId) -> bool {
        let Some(entry) = self.objects.remove(id) else {
            return false;
        };
        if let Some(handle) = entry.asset {
            if let Err(err) = self.assets.release(handle) {
                warn!(object_id = %id, error = %err, "Failed to release model");
            }
        }
        if self.player == Some(id) {
            info!(object_id = %id, "Player object destroyed");
            self.player = None;
            self.player_confirmed = false;
        }
        true
    }

    /// Advance the local world by one step, feeding the player's frame first
    pub fn step(&mut self, tick: u64, delta: f32, player_frame: Option<InputFrame>) -> ReplicaStepReport {
        let mut report = ReplicaStepReport {
            tick,
            ..ReplicaStepReport::default()
        };
        if !self.connected {
            return report;
        }

        if let (Some(frame), Some(player)) = (player_frame, self.player) {
            if let Some(entry) = self.objects.entry_mut(player) {
                entry.controller.queue_input(vec![frame]);
            }
        }

        let outcome = self.objects.simulate(tick, delta);
        report.shots = outcome.shots;
        report.failures = outcome.failures;
        report.hits = outcome
            .hits
            .into_iter()
            .map(|hit| HitEvent {
                projectile_id: hit.projectile.id,
                shooter_id: hit.shooter,
                target_id: hit.target,
                damage: hit.projectile.damage,
                position: hit.projectile.position,
                target_destroyed: false,
            })
            .collect();
        report
    }

    /// Stop following the authority; objects stay where they are
    pub fn disconnect(&mut self) -> Option<ReplicaEvent> {
        self.connected = false;
        if self.disconnect_reported {
            return None;
        }
        self.disconnect_reported = true;
        info!(objects = self.objects.len(), "Replica disconnected, world frozen");
        Some(ReplicaEvent::Disconnected)
    }

    /// Controller kind driving `id`, if present
    pub fn controller_kind(&self, id: ObjectId) -> Option<ControllerKind> {
        self.objects.controller_kind(id)
    }
}
