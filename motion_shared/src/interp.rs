//! Interpolation.
//!
//! The server commits poses at tick boundaries. Observers are sent smoothed
//! corrections blended between the two most recent committed poses.

use std::collections::VecDeque;

use crate::{math::Vec3, pose::Pose};

/// `a + (b - a) * t`, written so that `t = 0` yields `a` and `t = 1` yields
/// `b` exactly. `t` is not clamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a * (1.0 - t) + b * t
}

/// Blends every pose component (x, y, z, yaw, pitch) by `t`.
///
/// Total over any `t`; values outside `[0, 1]` extrapolate. Callers that want
/// strict interpolation clamp first.
pub fn lerp_pose(old: &Pose, new: &Pose, t: f64) -> Pose {
    Pose::new(
        Vec3::new(
            lerp(old.position.x, new.position.x, t),
            lerp(old.position.y, new.position.y, t),
            lerp(old.position.z, new.position.z, t),
        ),
        lerp(old.yaw as f64, new.yaw as f64, t) as f32,
        lerp(old.pitch as f64, new.pitch as f64, t) as f32,
    )
}

/// Bounded history of committed poses for one entity.
#[derive(Debug)]
pub struct PoseBuffer {
    history: VecDeque<(u64, Pose)>,
    max: usize,
}

impl Default for PoseBuffer {
    fn default() -> Self {
        Self::new(2)
    }
}

impl PoseBuffer {
    pub fn new(max: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max: max.max(2),
        }
    }

    /// Records the pose committed at `tick`.
    pub fn push(&mut self, tick: u64, pose: Pose) {
        self.history.push_back((tick, pose));
        while self.history.len() > self.max {
            self.history.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Pose between the two newest entries; `alpha` 0 = older, 1 = newer.
    ///
    /// With a single entry that pose is returned as-is.
    pub fn interpolated(&self, alpha: f64) -> Option<Pose> {
        match self.history.len() {
            0 => None,
            1 => self.history.back().map(|(_, p)| *p),
            n => {
                let (_, a) = &self.history[n - 2];
                let (_, b) = &self.history[n - 1];
                Some(lerp_pose(a, b, alpha))
            }
        }
    }

    pub fn latest(&self) -> Option<(u64, Pose)> {
        self.history.back().copied()
    }
}
