//! Kinematic error types.

use crate::{ecs::EntityId, math::Vec3, pose::Pose};

/// Invalid kinematic state detected while resolving a tick.
///
/// Raised before integration (bad input) or after collision resolution (bad
/// resolver output), so a NaN or infinite component never reaches a
/// committed pose.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KinematicError {
    /// The entity's current pose has a non-finite component.
    #[error("entity {entity:?} has non-finite pose {pose:?}")]
    NonFinitePose {
        /// Offending entity.
        entity: EntityId,
        /// Pose as stored on the entity.
        pose: Pose,
    },

    /// The entity's velocity has a non-finite component.
    #[error("entity {entity:?} has non-finite velocity {velocity:?}")]
    NonFiniteVelocity {
        /// Offending entity.
        entity: EntityId,
        /// Velocity as stored on the entity.
        velocity: Vec3,
    },

    /// The collision resolver returned a non-finite pose or velocity.
    #[error("collision resolver produced non-finite state for entity {entity:?}")]
    NonFiniteResolution {
        /// Entity being resolved.
        entity: EntityId,
    },

    /// A client-reported pose has a non-finite component.
    #[error("rejected non-finite reported pose {0:?}")]
    NonFiniteReport(Pose),
}
