//! Hit volumes and projectile proximity tests

use glam::Vec3;

use super::object::GameObject;
use super::physics::FlightStats;

/// Where a projectile is relative to a target along its firing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    /// The projectile's swept volume touches the target
    Hit,
    /// The projectile has not reached the target yet (or passes beside it)
    Ahead,
    /// The projectile is past the target's far side along its direction
    Behind,
}

/// Oriented box used as a target's hit geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitVolume {
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Unit local axes in world space
    pub axes: [Vec3; 3],
}

impl HitVolume {
    pub fn axis_aligned(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            axes: [Vec3::X, Vec3::Y, Vec3::Z],
        }
    }

    /// Hit box of an object, oriented with the object's basis
    pub fn of(object: &GameObject) -> Self {
        let stats = FlightStats::for_type(object.object_type());
        let (nx, ny, nz) = object.basis();
        Self {
            center: object.position,
            half_extents: stats.hit_half_extents,
            axes: [nx, ny, nz],
        }
    }

    /// Half-length of the box projected onto `direction` (unit)
    pub fn extent_along(&self, direction: Vec3) -> f32 {
        self.axes
            .iter()
            .zip(self.half_extents.to_array())
            .map(|(axis, half)| axis.dot(direction).abs() * half)
            .sum()
    }

    fn to_local(&self, point: Vec3) -> Vec3 {
        let d = point - self.center;
        Vec3::new(d.dot(self.axes[0]), d.dot(self.axes[1]), d.dot(self.axes[2]))
    }

    /// Whether a sphere moving from `start` to `end` touches the box.
    ///
    /// The box is inflated by `radius` on each axis and the segment is
    /// clipped against the three slabs in box space.
    pub fn intersects_swept_sphere(&self, start: Vec3, end: Vec3, radius: f32) -> bool {
        let from = self.to_local(start);
        let to = self.to_local(end);
        let dir = to - from;
        let half = self.half_extents + Vec3::splat(radius);

        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;
        for axis in 0..3 {
            let origin = from[axis];
            let d = dir[axis];
            if d.abs() < f32::EPSILON {
                if origin < -half[axis] || origin > half[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (-half[axis] - origin) * inv;
            let mut t1 = (half[axis] - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

/// Classify a projectile that moved from `previous` to `position` along
/// `direction` (unit) against a target volume.
pub fn classify(
    previous: Vec3,
    position: Vec3,
    direction: Vec3,
    radius: f32,
    target: &HitVolume,
) -> Proximity {
    if target.intersects_swept_sphere(previous, position, radius) {
        return Proximity::Hit;
    }
    let along = (position - target.center).dot(direction);
    if along > target.extent_along(direction) + radius {
        Proximity::Behind
    } else {
        Proximity::Ahead
    }
}
