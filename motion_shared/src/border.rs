//! World border.
//!
//! A square playable region on the x/z plane. Movement that would leave the
//! region is cancelled per axis; vertical movement is never restricted.

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Constrains a candidate position to the playable region.
///
/// Implementations must be idempotent for in-bounds positions and must never
/// return a position further out of bounds than `candidate`.
pub trait BorderClamp: Send + Sync {
    fn clamp(&self, old: Vec3, candidate: Vec3) -> Vec3;
}

/// Axes on which a position lies outside the border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionAxis {
    None,
    X,
    Z,
    Both,
}

/// Square border centred on `(center_x, center_z)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBorder {
    pub center_x: f64,
    pub center_z: f64,
    pub diameter: f64,
}

impl Default for WorldBorder {
    fn default() -> Self {
        Self {
            center_x: 0.0,
            center_z: 0.0,
            diameter: 29_999_984.0,
        }
    }
}

impl WorldBorder {
    pub fn new(center_x: f64, center_z: f64, diameter: f64) -> Self {
        Self {
            center_x,
            center_z,
            diameter,
        }
    }

    fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    fn inside_x(&self, x: f64) -> bool {
        x > self.center_x - self.radius() && x < self.center_x + self.radius()
    }

    fn inside_z(&self, z: f64) -> bool {
        z > self.center_z - self.radius() && z < self.center_z + self.radius()
    }

    /// Strictly inside on both horizontal axes.
    pub fn contains(&self, position: Vec3) -> bool {
        self.inside_x(position.x) && self.inside_z(position.z)
    }

    pub fn collision_axis(&self, position: Vec3) -> CollisionAxis {
        match (self.inside_x(position.x), self.inside_z(position.z)) {
            (true, true) => CollisionAxis::None,
            (false, true) => CollisionAxis::X,
            (true, false) => CollisionAxis::Z,
            (false, false) => CollisionAxis::Both,
        }
    }
}

impl BorderClamp for WorldBorder {
    fn clamp(&self, old: Vec3, candidate: Vec3) -> Vec3 {
        match self.collision_axis(candidate) {
            CollisionAxis::None => candidate,
            CollisionAxis::X => Vec3::new(old.x, candidate.y, candidate.z),
            CollisionAxis::Z => Vec3::new(candidate.x, candidate.y, old.z),
            CollisionAxis::Both => Vec3::new(old.x, candidate.y, old.z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn border() -> WorldBorder {
        WorldBorder::new(0.0, 0.0, 100.0)
    }

    #[test]
    fn in_bounds_clamp_is_identity_and_idempotent() {
        let b = border();
        let old = Vec3::new(0.0, 64.0, 0.0);
        let p = Vec3::new(10.0, 60.0, -20.0);
        let once = b.clamp(old, p);
        assert_eq!(once, p);
        assert_eq!(b.clamp(old, once), once);
    }

    #[test]
    fn leaving_on_x_keeps_old_x() {
        let b = border();
        let old = Vec3::new(49.0, 64.0, 0.0);
        let clamped = b.clamp(old, Vec3::new(51.0, 63.0, 1.0));
        assert_eq!(clamped, Vec3::new(49.0, 63.0, 1.0));
    }

    #[test]
    fn leaving_on_z_keeps_old_z() {
        let b = border();
        let old = Vec3::new(0.0, 64.0, -49.5);
        let clamped = b.clamp(old, Vec3::new(2.0, 64.0, -50.0));
        assert_eq!(clamped, Vec3::new(2.0, 64.0, -49.5));
    }

    #[test]
    fn leaving_on_both_keeps_only_vertical_motion() {
        let b = border();
        let old = Vec3::new(49.0, 64.0, 49.0);
        let clamped = b.clamp(old, Vec3::new(60.0, 70.0, 60.0));
        assert_eq!(clamped, Vec3::new(49.0, 70.0, 49.0));
        assert_eq!(b.collision_axis(Vec3::new(60.0, 0.0, 60.0)), CollisionAxis::Both);
    }

    #[test]
    fn never_moves_further_out() {
        // Already outside (border shrank under the entity).
        let b = border();
        let old = Vec3::new(80.0, 64.0, 0.0);
        let clamped = b.clamp(old, Vec3::new(90.0, 64.0, 0.0));
        assert_eq!(clamped.x, 80.0);
    }
}
