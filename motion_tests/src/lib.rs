//! Shared fixtures for the motion integration tests.

use std::collections::HashSet;

use motion_shared::prelude::*;

/// Absolute tolerance for positions produced by float division.
pub const EPS: f64 = 1e-9;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

pub fn approx_vec(a: Vec3, b: Vec3) -> bool {
    approx(a.x, b.x) && approx(a.y, b.y) && approx(a.z, b.z)
}

/// Minimal world: an explicit set of resident chunks and solid blocks.
#[derive(Debug, Default)]
pub struct FixtureWorld {
    pub chunks: ChunkMap,
    pub border: WorldBorder,
    pub solid: HashSet<BlockPos>,
}

impl FixtureWorld {
    /// World with the given chunks resident and the default border.
    pub fn with_chunks(chunks: &[(i32, i32)]) -> Self {
        let mut world = Self::default();
        for &(x, z) in chunks {
            world.chunks.load(ChunkPos::new(x, z));
        }
        world
    }

    pub fn bordered(mut self, border: WorldBorder) -> Self {
        self.border = border;
        self
    }
}

impl ChunkResidency for FixtureWorld {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.is_chunk_loaded(chunk)
    }
}

impl BorderClamp for FixtureWorld {
    fn clamp(&self, old: Vec3, candidate: Vec3) -> Vec3 {
        self.border.clamp(old, candidate)
    }
}

impl motion_shared::physics::BlockQuery for FixtureWorld {
    fn is_solid(&self, block: BlockPos) -> bool {
        self.solid.contains(&block)
    }
}

/// Resolver at `hz` ticks per second with block collision.
pub fn resolver(hz: u32) -> anyhow::Result<MotionResolver> {
    Ok(MotionResolver::new(TickRate::new(hz)?, Box::new(BlockCollision)))
}

/// Entity at `position` with `velocity`, physics disabled.
pub fn body(kind: EntityKind, position: Vec3, velocity: Vec3) -> Entity {
    Entity::new(EntityId(1), kind, InstanceId(0), Pose::new(position, 0.0, 0.0))
        .with_velocity(velocity)
        .with_flags(EntityFlags::NONE)
}
