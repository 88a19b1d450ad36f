//! Simulated game objects and their networked state

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::physics::FlightStats;
use super::{ObjectId, ObjectType};

/// A simulated entity owned by a state manager.
///
/// The basis vectors `nx`, `ny`, `nz` are derived from the orientation and
/// are recomputed whenever the orientation changes; they cannot be set
/// directly. Forward is `-nz`.
#[derive(Debug, Clone)]
pub struct GameObject {
    id: ObjectId,
    object_type: ObjectType,

    pub position: Vec3,
    orientation: Quat,
    /// Speed along the forward axis
    pub speed: f32,
    /// Components: (yaw, pitch, roll)
    pub angular_velocity: Vec3,
    pub angular_acceleration: Vec3,

    nx: Vec3,
    ny: Vec3,
    nz: Vec3,

    pub health: f32,
    pub firing: bool,
}

impl GameObject {
    /// Create an object with the default spawn transform for its type
    pub fn new(id: ObjectId, object_type: ObjectType) -> Self {
        let stats = FlightStats::for_type(object_type);
        Self {
            id,
            object_type,
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            speed: stats.cruise_speed,
            angular_velocity: Vec3::ZERO,
            angular_acceleration: Vec3::ZERO,
            nx: Vec3::X,
            ny: Vec3::Y,
            nz: Vec3::Z,
            health: stats.max_health,
            firing: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Set the orientation, normalizing it and rederiving the basis
    pub fn set_orientation(&mut self, orientation: Quat) {
        let normalized = orientation.normalize();
        self.orientation = if normalized.is_finite() {
            normalized
        } else {
            Quat::IDENTITY
        };
        self.nx = self.orientation * Vec3::X;
        self.ny = self.orientation * Vec3::Y;
        self.nz = self.orientation * Vec3::Z;
    }

    /// Local (x, y, z) axes in world space
    pub fn basis(&self) -> (Vec3, Vec3, Vec3) {
        (self.nx, self.ny, self.nz)
    }

    pub fn forward(&self) -> Vec3 {
        -self.nz
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.orientation.is_finite()
            && self.angular_velocity.is_finite()
            && self.speed.is_finite()
    }

    /// Advance rotation and position by one step
    pub fn integrate(&mut self, delta: f32, stats: &FlightStats) {
        if self.angular_acceleration.z == 0.0 {
            // No roll input: spin down without crossing zero
            let slowdown = stats.roll_acceleration * delta;
            self.angular_velocity.z = if self.angular_velocity.z.abs() <= slowdown {
                0.0
            } else {
                self.angular_velocity.z - slowdown * self.angular_velocity.z.signum()
            };
        } else {
            self.angular_velocity.z = (self.angular_velocity.z
                + self.angular_acceleration.z * delta)
                .clamp(-stats.roll_rate_max, stats.roll_rate_max);
        }

        // Positive yaw turns right, positive pitch raises the nose
        let w = self.angular_velocity;
        let spin = Quat::from_scaled_axis(Vec3::new(w.y, -w.x, w.z) * delta);
        self.set_orientation(self.orientation * spin);

        self.position += self.forward() * self.speed * delta;
    }

    /// Networked view of this object
    pub fn state(&self) -> ObjectState {
        ObjectState {
            id: self.id,
            object_type: self.object_type,
            position: self.position,
            orientation: self.orientation,
            speed: self.speed,
            angular_velocity: self.angular_velocity,
            health: self.health,
            firing: self.firing,
            last_input_tick: None,
        }
    }

    /// Overwrite the spatial and combat state with a networked record
    pub fn apply_state(&mut self, state: &ObjectState) {
        self.position = state.position;
        self.set_orientation(state.orientation);
        self.speed = state.speed;
        self.angular_velocity = state.angular_velocity;
        self.health = state.health;
        self.firing = state.firing;
    }
}

/// Per-object record carried in snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub id: ObjectId,
    pub object_type: ObjectType,
    pub position: Vec3,
    pub orientation: Quat,
    pub speed: f32,
    pub angular_velocity: Vec3,
    pub health: f32,
    pub firing: bool,
    /// Newest input frame the authority applied for this object
    pub last_input_tick: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn default_ship_flies_along_negative_z() {
        let stats = FlightStats::for_type(ObjectType::SpaceFighter);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);

        ship.integrate(1.0, &stats);

        assert!((ship.position - Vec3::new(0.0, 0.0, -stats.cruise_speed)).length() < EPSILON);
    }

    #[test]
    fn positive_yaw_turns_right() {
        let stats = FlightStats::for_type(ObjectType::SpaceFighter);
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        ship.angular_velocity.x = 0.5;

        ship.integrate(0.5, &stats);

        assert!(ship.forward().x > 0.0);
    }

    #[test]
    fn basis_follows_orientation() {
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        ship.set_orientation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));

        let (nx, ny, nz) = ship.basis();
        assert!((nx - Vec3::new(0.0, 0.0, -1.0)).length() < EPSILON);
        assert!((ny - Vec3::Y).length() < EPSILON);
        assert!((nz - Vec3::X).length() < EPSILON);
    }

    #[test]
    fn unnormalized_orientation_is_normalized() {
        let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);
        ship.set_orientation(Quat::from_xyzw(0.0, 2.0, 0.0, 2.0));
        assert!((ship.orientation().length() - 1.0).abs() < EPSILON);
    }

    proptest! {
        #[test]
        fn orientation_stays_unit_length(
            rates in prop::collection::vec((-3.0f32..3.0, -3.0f32..3.0, -1.0f32..1.0), 1..400),
        ) {
            let stats = FlightStats::for_type(ObjectType::SpaceFighter);
            let mut ship = GameObject::new(ObjectId(1), ObjectType::SpaceFighter);

            for (yaw, pitch, roll) in rates {
                ship.angular_velocity.x = yaw;
                ship.angular_velocity.y = pitch;
                ship.angular_acceleration.z = roll * stats.roll_acceleration;
                ship.integrate(1.0 / 60.0, &stats);

                let norm = ship.orientation().length();
                prop_assert!((norm - 1.0).abs() < EPSILON);

                let (nx, ny, nz) = ship.basis();
                prop_assert!(nx.dot(ny).abs() < EPSILON);
                prop_assert!(ny.dot(nz).abs() < EPSILON);
                prop_assert!(nz.dot(nx).abs() < EPSILON);
            }
        }
    }
}
