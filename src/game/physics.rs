//! Flight physics constants and control integration

use glam::Vec3;

use super::input::ControlState;
use super::object::GameObject;
use super::ObjectType;

/// Flight constants per object type (units per second, radians per second)
#[derive(Debug, Clone, Copy)]
pub struct FlightStats {
    /// Maximum yaw rate
    pub yaw_rate_max: f32,
    /// Maximum pitch rate
    pub pitch_rate_max: f32,
    /// Maximum roll rate
    pub roll_rate_max: f32,
    /// Roll acceleration while rolling, and deceleration once released
    pub roll_acceleration: f32,
    /// How fast yaw and pitch rates converge to their targets
    pub angular_converge_rate: f32,
    /// Forward speed along the local -z axis
    pub cruise_speed: f32,
    /// Maximum health
    pub max_health: f32,
    /// Half extents of the oriented hit box
    pub hit_half_extents: Vec3,
    /// Distance in front of the object where projectiles spawn
    pub muzzle_offset: f32,
}

impl FlightStats {
    pub fn for_type(object_type: ObjectType) -> Self {
        match object_type {
            ObjectType::SpaceFighter => Self {
                yaw_rate_max: 0.6,
                pitch_rate_max: 0.6,
                roll_rate_max: 2.0,
                roll_acceleration: 5.0,
                angular_converge_rate: 1.0,
                cruise_speed: 5.0,
                max_health: 100.0,
                hit_half_extents: Vec3::new(4.0, 1.5, 5.0),
                muzzle_offset: 6.0,
            },
            ObjectType::Asteroid => Self {
                yaw_rate_max: 0.0,
                pitch_rate_max: 0.0,
                roll_rate_max: 0.3,
                roll_acceleration: 0.1,
                angular_converge_rate: 0.0,
                cruise_speed: 0.5,
                max_health: 60.0,
                hit_half_extents: Vec3::splat(5.0),
                muzzle_offset: 0.0,
            },
        }
    }
}

/// Physics system for steering and integrating objects
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply one tick of control input, then integrate the object
    pub fn apply_controls(
        object: &mut GameObject,
        control: &ControlState,
        stats: &FlightStats,
        delta: f32,
    ) {
        let step = stats.angular_converge_rate * delta;

        // Yaw and pitch rates chase a target set by the stick position
        let yaw_target = control.yaw * stats.yaw_rate_max;
        let pitch_target = control.pitch * stats.pitch_rate_max;
        object.angular_velocity.x = Self::converge(object.angular_velocity.x, yaw_target, step);
        object.angular_velocity.y = Self::converge(object.angular_velocity.y, pitch_target, step);

        // Roll is driven by acceleration
        object.angular_acceleration.z = control.roll * stats.roll_acceleration;

        object.integrate(delta, stats);
    }

    /// Move `current` toward `target` by at most `step`, never overshooting
    pub fn converge(current: f32, target: f32, step: f32) -> f32 {
        let diff = target - current;
        if diff.abs() <= step {
            target
        } else {
            current + step * diff.signum()
        }
    }
}
