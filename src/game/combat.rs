//! Combat system - weapons, projectiles, damage

use glam::Vec3;

use super::{ObjectId, ObjectType};

/// Weapon stats per object type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    /// Damage per hit
    pub damage: f32,
    /// Projectile speed (units per second)
    pub projectile_speed: f32,
    /// Cooldown between shots (seconds)
    pub cooldown: f32,
    /// Distance a projectile travels before expiring
    pub range: f32,
    /// Projectile hit sphere radius
    pub projectile_radius: f32,
}

impl WeaponStats {
    pub fn for_type(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::SpaceFighter => Self {
                damage: 12.0,
                projectile_speed: 200.0,
                cooldown: 0.15,
                range: 400.0,
                projectile_radius: 0.5,
            },
            // Asteroids carry no weapon; a zero-range gun never produces live rounds
            ObjectType::Asteroid => Self {
                damage: 0.0,
                projectile_speed: 0.0,
                cooldown: f32::INFINITY,
                range: 0.0,
                projectile_radius: 0.0,
            },
        }
    }
}

/// Lifecycle of a projectile; `Hit` and `Expired` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileState {
    Active,
    Hit,
    Expired,
}

/// Short-lived round owned by a projectile sequence
#[derive(Debug, Clone)]
pub struct Projectile {
    /// Identifier unique within the owning sequence
    pub id: u32,
    pub origin: ObjectId,
    pub position: Vec3,
    /// Position before the last advance, for swept hit tests
    pub previous_position: Vec3,
    /// Unit firing direction
    pub direction: Vec3,
    pub speed: f32,
    pub radius: f32,
    pub damage: f32,
    pub created_tick: u64,
    pub range_remaining: f32,
    pub state: ProjectileState,
}

impl Projectile {
    pub fn new(
        id: u32,
        origin: ObjectId,
        position: Vec3,
        direction: Vec3,
        created_tick: u64,
        stats: &WeaponStats,
    ) -> Self {
        Self {
            id,
            origin,
            position,
            previous_position: position,
            direction: direction.normalize_or_zero(),
            speed: stats.projectile_speed,
            radius: stats.projectile_radius,
            damage: stats.damage,
            created_tick,
            range_remaining: stats.range,
            state: ProjectileState::Active,
        }
    }

    /// Move along the firing direction; returns the resulting state
    pub fn advance(&mut self, delta: f32) -> ProjectileState {
        if self.state != ProjectileState::Active {
            return self.state;
        }
        let distance = self.speed * delta;
        self.previous_position = self.position;
        self.position += self.direction * distance;
        self.range_remaining -= distance;
        if self.range_remaining <= 0.0 {
            self.state = ProjectileState::Expired;
        }
        self.state
    }
}

/// Damage resolution
pub struct CombatSystem;

impl CombatSystem {
    /// Apply damage to health, returns (new_health, is_dead)
    pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
        let new_health = (current_health - damage).max(0.0);
        (new_health, new_health <= 0.0)
    }
}

/// A projectile that struck an object
#[derive(Debug, Clone, PartialEq)]
pub struct HitEvent {
    pub projectile_id: u32,
    pub shooter_id: ObjectId,
    pub target_id: ObjectId,
    pub damage: f32,
    pub position: Vec3,
    pub target_destroyed: bool,
}
