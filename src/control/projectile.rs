//! Projectile sequence controller: same-origin rounds and ordered hit-testing

use std::collections::VecDeque;

use glam::Vec3;
use tracing::trace;

use crate::game::geometry::classify;
use crate::game::{
    GameObject, HitVolume, ObjectId, ObjectState, Projectile, ProjectileState, Proximity,
    WeaponStats,
};

use super::{Controller, ControllerError, ControllerKind, TickContext};

/// How `find_hits_with_object` walks the sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitTestPolicy {
    /// Stop at the first projectile that is already past the target
    #[default]
    EarlyExit,
    /// Test every live projectile
    Exhaustive,
}

/// Owns the rounds fired by one object.
///
/// Rounds are kept nearest-to-the-shooter first: each new round is pushed
/// to the front. The early exit in [`find_hits_with_object`] assumes that
/// once one round is past the target every older round is too. That holds
/// exactly while the rounds are parallel, since they share a speed. Once the
/// shooter turns between shots the rounds fly on diverging lines, and an
/// older round can still be on the target while a newer one has passed it
/// on its own line; the early exit then misses that hit.
/// [`HitTestPolicy::Exhaustive`] tests every round and has no such gap.
///
/// [`find_hits_with_object`]: ProjectileSequenceController::find_hits_with_object
pub struct ProjectileSequenceController {
    origin: ObjectId,
    weapon: WeaponStats,
    policy: HitTestPolicy,
    projectiles: VecDeque<Projectile>,
    cooldown: f32,
    next_id: u32,
    fired: u64,
    expired: u64,
}

impl ProjectileSequenceController {
    pub fn new(origin: ObjectId, weapon: WeaponStats, policy: HitTestPolicy) -> Self {
        Self {
            origin,
            weapon,
            policy,
            projectiles: VecDeque::new(),
            cooldown: 0.0,
            next_id: 1,
            fired: 0,
            expired: 0,
        }
    }

    pub fn origin(&self) -> ObjectId {
        self.origin
    }

    pub fn policy(&self) -> HitTestPolicy {
        self.policy
    }

    /// Live rounds, nearest to the shooter first
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.iter()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    pub fn expired(&self) -> u64 {
        self.expired
    }

    /// Fire a round if the weapon is ready; returns its id
    pub fn fire(&mut self, muzzle: Vec3, direction: Vec3, tick: u64) -> Option<u32> {
        if self.cooldown > 0.0 || self.weapon.range <= 0.0 {
            return None;
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.projectiles.push_front(Projectile::new(
            id,
            self.origin,
            muzzle,
            direction,
            tick,
            &self.weapon,
        ));
        self.cooldown = self.weapon.cooldown;
        self.fired += 1;
        Some(id)
    }

    /// Append rounds that are already in nearest-first order
    pub fn load(&mut self, projectiles: impl IntoIterator<Item = Projectile>) {
        self.projectiles.extend(projectiles);
    }

    /// Move every round and drop the ones whose range is spent
    pub fn advance(&mut self, delta: f32) -> usize {
        self.cooldown = (self.cooldown - delta).max(0.0);
        for projectile in self.projectiles.iter_mut() {
            projectile.advance(delta);
        }
        let before = self.projectiles.len();
        self.projectiles
            .retain(|projectile| projectile.state == ProjectileState::Active);
        let expired = before - self.projectiles.len();
        self.expired += expired as u64;
        expired
    }

    /// Rounds striking `target`, removed from the sequence and marked `Hit`.
    ///
    /// Returns `None` when nothing hit. Under the early-exit policy the walk
    /// stops at the first round found past the target; rounds hit before
    /// that point are still returned.
    pub fn find_hits_with_object(&mut self, target: &HitVolume) -> Option<Vec<Projectile>> {
        self.find_hits_with(target, |projectile, volume| {
            classify(
                projectile.previous_position,
                projectile.position,
                projectile.direction,
                projectile.radius,
                volume,
            )
        })
    }

    /// Same walk as [`find_hits_with_object`] with a caller-supplied test
    ///
    /// [`find_hits_with_object`]: ProjectileSequenceController::find_hits_with_object
    pub fn find_hits_with<F>(&mut self, target: &HitVolume, mut test: F) -> Option<Vec<Projectile>>
    where
        F: FnMut(&Projectile, &HitVolume) -> Proximity,
    {
        let mut hit_indices = Vec::new();
        for (index, projectile) in self.projectiles.iter().enumerate() {
            match test(projectile, target) {
                Proximity::Hit => hit_indices.push(index),
                Proximity::Behind if self.policy == HitTestPolicy::EarlyExit => {
                    trace!(origin = %self.origin, tested = index + 1, "Early exit");
                    break;
                }
                Proximity::Behind | Proximity::Ahead => {}
            }
        }

        if hit_indices.is_empty() {
            return None;
        }

        let mut hits = Vec::with_capacity(hit_indices.len());
        for index in hit_indices.into_iter().rev() {
            if let Some(mut projectile) = self.projectiles.remove(index) {
                projectile.state = ProjectileState::Hit;
                hits.push(projectile);
            }
        }
        hits.reverse();
        Some(hits)
    }
}

impl Controller for ProjectileSequenceController {
    fn kind(&self) -> ControllerKind {
        ControllerKind::Sequence
    }

    fn update(
        &mut self,
        _origin: &mut GameObject,
        ctx: &mut TickContext<'_>,
    ) -> Result<(), ControllerError> {
        self.advance(ctx.delta);
        Ok(())
    }

    fn apply_remote_state(&mut self, _origin: &mut GameObject, _state: &ObjectState) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ObjectType;

    fn weapon() -> WeaponStats {
        WeaponStats::for_type(ObjectType::SpaceFighter)
    }

    fn round_at(x: f32) -> Projectile {
        Projectile::new(0, ObjectId(1), Vec3::new(x, 0.0, 0.0), Vec3::X, 0, &weapon())
    }

    fn target() -> HitVolume {
        HitVolume::axis_aligned(Vec3::ZERO, Vec3::splat(5.0))
    }

    #[test]
    fn rounds_past_the_target_exit_after_one_test() {
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::EarlyExit);
        sequence.load([round_at(12.0), round_at(13.0), round_at(14.0)]);

        let mut calls = 0;
        let result = sequence.find_hits_with(&target(), |projectile, volume| {
            calls += 1;
            classify(projectile.previous_position, projectile.position, projectile.direction, projectile.radius, volume)
        });

        assert!(result.is_none());
        assert_eq!(calls, 1);
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn approaching_rounds_are_tested_until_one_is_behind() {
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::EarlyExit);
        // Nearest-first: three still approaching, then one past, then more past
        sequence.load([
            round_at(-40.0),
            round_at(-30.0),
            round_at(-20.0),
            round_at(20.0),
            round_at(30.0),
        ]);

        let mut calls = 0;
        let result = sequence.find_hits_with(&target(), |projectile, volume| {
            calls += 1;
            classify(projectile.previous_position, projectile.position, projectile.direction, projectile.radius, volume)
        });

        assert!(result.is_none());
        assert_eq!(calls, 4);
    }

    #[test]
    fn hits_before_the_exit_are_returned_and_removed() {
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::EarlyExit);
        sequence.load([round_at(-20.0), round_at(0.0), round_at(12.0), round_at(3.0)]);

        let hits = sequence.find_hits_with_object(&target()).expect("one hit");

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position.x, 0.0);
        assert_eq!(hits[0].state, ProjectileState::Hit);
        // The round at 3.0 sits behind the early exit and is not tested
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn exhaustive_policy_tests_every_round() {
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::Exhaustive);
        sequence.load([round_at(-20.0), round_at(0.0), round_at(12.0), round_at(3.0)]);

        let mut calls = 0;
        let hits = sequence
            .find_hits_with(&target(), |projectile, volume| {
                calls += 1;
                classify(projectile.previous_position, projectile.position, projectile.direction, projectile.radius, volume)
            })
            .expect("two hits");

        assert_eq!(calls, 4);
        assert_eq!(hits.len(), 2);
        assert_eq!(sequence.len(), 2);
    }

    #[test]
    fn turning_shooter_hit_is_only_found_exhaustively() {
        // Newest round flew along +X and is past the target; the older one
        // was fired before a turn, along -Z, and sits on the target.
        let rounds = || {
            [
                Projectile::new(2, ObjectId(1), Vec3::new(12.0, 0.0, 0.0), Vec3::X, 5, &weapon()),
                Projectile::new(1, ObjectId(1), Vec3::ZERO, Vec3::NEG_Z, 1, &weapon()),
            ]
        };

        let mut early = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::EarlyExit);
        early.load(rounds());
        assert!(early.find_hits_with_object(&target()).is_none());
        assert_eq!(early.len(), 2);

        let mut exhaustive = ProjectileSequenceController::new(ObjectId(1), weapon(), HitTestPolicy::Exhaustive);
        exhaustive.load(rounds());
        let hits = exhaustive.find_hits_with_object(&target()).expect("older round hits");
        assert_eq!(hits.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn fire_respects_cooldown_and_orders_nearest_first() {
        let stats = weapon();
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), stats, HitTestPolicy::EarlyExit);

        assert_eq!(sequence.fire(Vec3::ZERO, Vec3::X, 1), Some(1));
        assert_eq!(sequence.fire(Vec3::ZERO, Vec3::X, 2), None);

        sequence.advance(stats.cooldown);
        assert_eq!(sequence.fire(Vec3::ZERO, Vec3::X, 10), Some(2));

        let ids: Vec<u32> = sequence.projectiles().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);
        let xs: Vec<f32> = sequence.projectiles().map(|p| p.position.x).collect();
        assert!(xs[0] < xs[1]);
    }

    #[test]
    fn rounds_expire_after_range() {
        let stats = weapon();
        let mut sequence = ProjectileSequenceController::new(ObjectId(1), stats, HitTestPolicy::EarlyExit);
        sequence.fire(Vec3::ZERO, Vec3::X, 1);

        let flight_time = stats.range / stats.projectile_speed;
        let steps = (flight_time * 60.0).ceil() as usize + 1;
        let expired: usize = (0..steps).map(|_| sequence.advance(1.0 / 60.0)).sum();

        assert_eq!(expired, 1);
        assert!(sequence.is_empty());
        assert_eq!(sequence.expired(), 1);
    }

    #[test]
    fn unarmed_objects_never_fire() {
        let mut sequence = ProjectileSequenceController::new(
            ObjectId(3),
            WeaponStats::for_type(ObjectType::Asteroid),
            HitTestPolicy::EarlyExit,
        );
        assert_eq!(sequence.fire(Vec3::ZERO, Vec3::X, 1), None);
    }
}
