//! Entity pose: position plus view orientation.

use serde::{Deserialize, Serialize};

use crate::{error::KinematicError, math::Vec3};

/// Position and orientation of an entity at one point in time.
///
/// Poses are values. Every change produces a new `Pose`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    pub position: Vec3,
    /// Yaw in degrees.
    pub yaw: f32,
    /// Pitch in degrees.
    pub pitch: f32,
}

impl Pose {
    pub const fn new(position: Vec3, yaw: f32, pitch: f32) -> Self {
        Self {
            position,
            yaw,
            pitch,
        }
    }

    /// Pose at `(x, y, z)` looking straight ahead.
    pub const fn at(x: f64, y: f64, z: f64) -> Self {
        Self::new(Vec3::new(x, y, z), 0.0, 0.0)
    }

    /// Builds a pose, rejecting NaN and infinite components.
    pub fn try_new(position: Vec3, yaw: f32, pitch: f32) -> Result<Self, KinematicError> {
        let pose = Self::new(position, yaw, pitch);
        if pose.is_finite() {
            Ok(pose)
        } else {
            Err(KinematicError::NonFiniteReport(pose))
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.yaw.is_finite() && self.pitch.is_finite()
    }

    /// Same position, ignoring view direction.
    pub fn same_point(&self, other: &Pose) -> bool {
        self.position == other.position
    }

    pub fn with_position(self, position: Vec3) -> Self {
        Self { position, ..self }
    }

    pub fn with_view(self, yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch, ..self }
    }

    /// Pose translated by `delta`; orientation is kept.
    pub fn add(self, delta: Vec3) -> Self {
        self.with_position(self.position + delta)
    }
}
