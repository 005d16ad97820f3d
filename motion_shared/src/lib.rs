//! `motion_shared`
//!
//! Per-tick kinematic resolution for an authoritative game server.
//!
//! Each tick, every movable entity goes through:
//! integrate → collide → clamp to the world border → chunk residency gate →
//! authority policy → atomic commit.
//!
//! Design goals:
//! - Resolution is a pure function of entity state and read-only world
//!   queries; the only write is [`ecs::Entity::commit`].
//! - Collision, border and residency are traits so hosts can swap engines.
//! - Non-finite kinematic state is rejected, never committed.
//! - No `unsafe`.

pub mod authority;
pub mod border;
pub mod chunk;
pub mod config;
pub mod console;
pub mod ecs;
pub mod error;
pub mod instance;
pub mod integrator;
pub mod interp;
pub mod math;
pub mod motion;
pub mod physics;
pub mod pose;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::authority::Verdict;
    pub use crate::border::{BorderClamp, WorldBorder};
    pub use crate::chunk::{ChunkMap, ChunkPos, ChunkResidency};
    pub use crate::config::{ServerConfig, TickRate};
    pub use crate::ecs::*;
    pub use crate::error::KinematicError;
    pub use crate::instance::Instance;
    pub use crate::math::*;
    pub use crate::motion::{MotionResolver, MotionWorld, TickOutcome};
    pub use crate::physics::{BlockCollision, BlockPos, CollisionResolver, PassThrough, PhysicsConfig};
    pub use crate::pose::Pose;
}
