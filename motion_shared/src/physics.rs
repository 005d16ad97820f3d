//! Collision resolution.
//!
//! The tick resolver treats collision as a capability: hand it a pose, a
//! per-tick displacement and the previous result, get back the adjusted pose
//! and velocity. [`PassThrough`] ignores geometry; [`BlockCollision`] sweeps a
//! point body through a grid of solid unit blocks.

use serde::{Deserialize, Serialize};

use crate::{config::TickRate, math::Vec3, pose::Pose};

/// Physics parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Acceleration applied to airborne entities, in blocks per second squared.
    pub gravity: Vec3,
    /// Fastest downward speed gravity alone can reach, in blocks per second.
    #[serde(default = "default_terminal_speed")]
    pub terminal_speed: f64,
}

fn default_terminal_speed() -> f64 {
    78.4
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            terminal_speed: default_terminal_speed(),
        }
    }
}

impl PhysicsConfig {
    /// Velocity change contributed by gravity over one tick.
    pub fn gravity_per_tick(&self, rate: TickRate) -> Vec3 {
        self.gravity / rate.as_f64()
    }

    /// `velocity` after one tick of gravity, with the vertical component
    /// limited to the terminal speed.
    pub fn apply_gravity(&self, velocity: Vec3, rate: TickRate) -> Vec3 {
        if velocity.y <= -self.terminal_speed {
            return velocity;
        }
        let v = velocity + self.gravity_per_tick(rate);
        if v.y < -self.terminal_speed {
            v.with_y(-self.terminal_speed)
        } else {
            v
        }
    }
}

/// Integer block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Block containing a world position.
    pub fn containing(p: Vec3) -> Self {
        Self::new(p.x.floor() as i32, p.y.floor() as i32, p.z.floor() as i32)
    }
}

/// Read access to solid geometry.
pub trait BlockQuery: Send + Sync {
    fn is_solid(&self, block: BlockPos) -> bool;
}

/// Output of one collision query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsResult {
    /// Adjusted pose after the displacement.
    pub pose: Pose,
    /// Adjusted per-tick displacement actually travelled.
    pub velocity: Vec3,
    /// Standing on solid geometry after the move.
    pub on_ground: bool,
    pub collision_x: bool,
    pub collision_y: bool,
    pub collision_z: bool,
}

impl PhysicsResult {
    /// Result of a move that touched nothing.
    pub fn unobstructed(pose: Pose, velocity: Vec3) -> Self {
        Self {
            pose,
            velocity,
            on_ground: false,
            collision_x: false,
            collision_y: false,
            collision_z: false,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.velocity.is_finite()
    }

    pub fn has_collision(&self) -> bool {
        self.collision_x || self.collision_y || self.collision_z
    }
}

/// Geometry-aware displacement resolution.
pub trait CollisionResolver: Send + Sync {
    fn resolve(
        &self,
        blocks: &dyn BlockQuery,
        pose: Pose,
        displacement: Vec3,
        previous: Option<&PhysicsResult>,
    ) -> PhysicsResult;
}

/// Moves straight through everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl CollisionResolver for PassThrough {
    fn resolve(
        &self,
        _blocks: &dyn BlockQuery,
        pose: Pose,
        displacement: Vec3,
        _previous: Option<&PhysicsResult>,
    ) -> PhysicsResult {
        PhysicsResult::unobstructed(pose.add(displacement), displacement)
    }
}

/// Gap left between a stopped body and the face it hit.
const CONTACT_EPSILON: f64 = 1e-7;

/// Longest distance one axis may travel in a single tick, in blocks. Longer
/// displacements stop here and count as blocked.
pub const MAX_SWEEP_DISTANCE: f64 = 512.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn get(self, v: Vec3) -> f64 {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
            Axis::Z => v.z,
        }
    }

    fn set(self, v: Vec3, value: f64) -> Vec3 {
        match self {
            Axis::X => Vec3 { x: value, ..v },
            Axis::Y => Vec3 { y: value, ..v },
            Axis::Z => Vec3 { z: value, ..v },
        }
    }

    fn cell(self, block: BlockPos, value: i32) -> BlockPos {
        match self {
            Axis::X => BlockPos { x: value, ..block },
            Axis::Y => BlockPos { y: value, ..block },
            Axis::Z => BlockPos { z: value, ..block },
        }
    }
}

/// Point body swept against unit blocks, one axis at a time (y, then x, then z).
///
/// Each axis walks the block cells between start and target and stops just
/// short of the first solid face. The blocked velocity component is zeroed.
/// An axis never walks further than [`MAX_SWEEP_DISTANCE`] per tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockCollision;

impl BlockCollision {
    /// Returns the reached coordinate and whether a solid face stopped it.
    fn sweep(blocks: &dyn BlockQuery, from: Vec3, axis: Axis, delta: f64) -> (f64, bool) {
        let start = axis.get(from);
        if delta == 0.0 {
            return (start, false);
        }
        let capped = delta.clamp(-MAX_SWEEP_DISTANCE, MAX_SWEEP_DISTANCE);
        let target = start + capped;

        let origin = BlockPos::containing(from);
        let end_cell = target.floor() as i32;
        let step = if delta > 0.0 { 1 } else { -1 };
        let mut cell = start.floor() as i32;

        while cell != end_cell {
            let next = cell + step;
            if blocks.is_solid(axis.cell(origin, next)) {
                let face = if step > 0 {
                    next as f64 - CONTACT_EPSILON
                } else {
                    (next + 1) as f64 + CONTACT_EPSILON
                };
                return (face, true);
            }
            cell = next;
        }
        (target, capped != delta)
    }

    fn supported(blocks: &dyn BlockQuery, position: Vec3) -> bool {
        let below = BlockPos::containing(position.with_y(position.y - 2.0 * CONTACT_EPSILON));
        blocks.is_solid(below)
    }
}

impl CollisionResolver for BlockCollision {
    fn resolve(
        &self,
        blocks: &dyn BlockQuery,
        pose: Pose,
        displacement: Vec3,
        previous: Option<&PhysicsResult>,
    ) -> PhysicsResult {
        let mut position = pose.position;
        let mut velocity = displacement;
        let mut hit = [false; 3];

        for (i, axis) in [Axis::Y, Axis::X, Axis::Z].into_iter().enumerate() {
            let (reached, blocked) = Self::sweep(blocks, position, axis, axis.get(displacement));
            position = axis.set(position, reached);
            if blocked {
                velocity = axis.set(velocity, 0.0);
                hit[i] = true;
            }
        }

        let on_ground = if hit[0] {
            displacement.y < 0.0
        } else if displacement.y == 0.0 {
            // Resting bodies stay grounded while the block underneath remains.
            previous.is_some_and(|p| p.on_ground) && Self::supported(blocks, position)
        } else {
            false
        };

        PhysicsResult {
            pose: pose.with_position(position),
            velocity,
            on_ground,
            collision_x: hit[1],
            collision_y: hit[0],
            collision_z: hit[2],
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct Blocks(HashSet<BlockPos>);

    impl BlockQuery for Blocks {
        fn is_solid(&self, block: BlockPos) -> bool {
            self.0.contains(&block)
        }
    }

    fn floor_at_zero() -> Blocks {
        let mut set = HashSet::new();
        for x in -2..=2 {
            for z in -2..=2 {
                set.insert(BlockPos::new(x, 0, z));
            }
        }
        Blocks(set)
    }

    #[test]
    fn gravity_stops_at_terminal_speed() {
        let cfg = PhysicsConfig {
            gravity: Vec3::new(0.0, -20.0, 0.0),
            terminal_speed: 3.0,
        };
        let rate = TickRate::new(10).unwrap();
        let mut v = Vec3::ZERO;
        v = cfg.apply_gravity(v, rate);
        assert_eq!(v, Vec3::new(0.0, -2.0, 0.0));
        v = cfg.apply_gravity(v, rate);
        assert_eq!(v, Vec3::new(0.0, -3.0, 0.0));
        v = cfg.apply_gravity(v, rate);
        assert_eq!(v, Vec3::new(0.0, -3.0, 0.0));
        // Faster than terminal from an explicit push: gravity adds nothing.
        assert_eq!(cfg.apply_gravity(Vec3::new(1.0, -5.0, 0.0), rate), Vec3::new(1.0, -5.0, 0.0));
    }

    #[test]
    fn pass_through_adds_displacement() {
        let r = PassThrough.resolve(
            &floor_at_zero(),
            Pose::at(0.5, 5.0, 0.5),
            Vec3::new(0.0, -10.0, 0.0),
            None,
        );
        assert_eq!(r.pose.position, Vec3::new(0.5, -5.0, 0.5));
        assert_eq!(r.velocity, Vec3::new(0.0, -10.0, 0.0));
        assert!(!r.has_collision());
    }

    #[test]
    fn falling_body_lands_on_floor() {
        let r = BlockCollision.resolve(
            &floor_at_zero(),
            Pose::at(0.5, 1.5, 0.5),
            Vec3::new(0.0, -1.0, 0.0),
            None,
        );
        assert!(r.collision_y);
        assert!(r.on_ground);
        assert_eq!(r.velocity.y, 0.0);
        assert!(r.pose.position.y > 1.0 && r.pose.position.y < 1.001);
    }

    #[test]
    fn free_fall_above_floor_is_unobstructed() {
        let r = BlockCollision.resolve(
            &floor_at_zero(),
            Pose::at(0.5, 10.0, 0.5),
            Vec3::new(0.25, -0.5, 0.0),
            None,
        );
        assert!(!r.has_collision());
        assert!(!r.on_ground);
        assert_eq!(r.pose.position, Vec3::new(0.75, 9.5, 0.5));
    }

    #[test]
    fn wall_blocks_horizontal_motion_only() {
        let mut set = HashSet::new();
        set.insert(BlockPos::new(2, 5, 0));
        let r = BlockCollision.resolve(
            &Blocks(set),
            Pose::at(1.5, 5.5, 0.5),
            Vec3::new(1.0, 0.0, 0.25),
            None,
        );
        assert!(r.collision_x);
        assert!(!r.collision_z);
        assert_eq!(r.velocity.x, 0.0);
        assert!(r.pose.position.x < 2.0);
        assert_eq!(r.pose.position.z, 0.75);
    }

    #[test]
    fn resting_body_keeps_ground_contact() {
        let blocks = floor_at_zero();
        let landed = BlockCollision.resolve(
            &blocks,
            Pose::at(0.5, 1.2, 0.5),
            Vec3::new(0.0, -0.5, 0.0),
            None,
        );
        assert!(landed.on_ground);

        let rest = BlockCollision.resolve(&blocks, landed.pose, Vec3::ZERO, Some(&landed));
        assert!(rest.on_ground);
        assert_eq!(rest.pose, landed.pose);
    }

    #[test]
    fn oversized_displacement_stops_at_sweep_limit() {
        let blocks = floor_at_zero();
        let r = BlockCollision.resolve(
            &blocks,
            Pose::at(0.5, 10.0, 0.5),
            Vec3::new(0.0, 2e9, -1e300),
            None,
        );
        assert_eq!(r.pose.position.y, 10.0 + MAX_SWEEP_DISTANCE);
        assert_eq!(r.pose.position.z, 0.5 - MAX_SWEEP_DISTANCE);
        assert!(r.collision_y && r.collision_z && !r.collision_x);
        assert_eq!(r.velocity, Vec3::ZERO);
        assert!(!r.on_ground);

        // A solid face inside the limit still stops the body first.
        let down = BlockCollision.resolve(&blocks, Pose::at(0.5, 10.0, 0.5), Vec3::new(0.0, -2e9, 0.0), None);
        assert!(down.on_ground);
        assert!(down.pose.position.y > 1.0 && down.pose.position.y < 1.001);
    }
}
