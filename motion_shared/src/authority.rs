//! Authority policy.
//!
//! Decides whether a computed position replaces the entity's recorded one.
//! Rows are evaluated top to bottom; the first match wins.
//!
//! | Condition                                  | Verdict               |
//! |--------------------------------------------|-----------------------|
//! | final position equals current position     | `NoDisplacement`      |
//! | velocity set by gameplay this tick         | `ExplicitVelocity`    |
//! | computed velocity is zero                  | `ZeroVelocity`        |
//! | destination chunk not resident             | `ChunkNotLoaded`      |
//! | item or falling block                      | `ServerAuthoritative` |
//! | controlled by a remote socket              | `DeferredToClient`    |
//! | anything else                              | `ServerSimulated`     |

use crate::{
    chunk::{ChunkPos, Gate},
    ecs::{Entity, EntityKind},
    math::Vec3,
};

/// Why a tick ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Riding a vehicle; the vehicle drives the pose.
    Passenger,
    /// No velocity and exempt from gravity; integration skipped.
    AtRest,
    /// Border and collision left the entity where it was.
    NoDisplacement,
    /// Gameplay assigned the velocity this tick.
    ExplicitVelocity,
    /// The resolved velocity is the zero vector.
    ZeroVelocity,
    /// Destination chunk is not resident.
    ChunkNotLoaded(ChunkPos),
    /// Item or falling block: server position always wins.
    ServerAuthoritative(EntityKind),
    /// Socket-controlled: the client's reported position is kept.
    DeferredToClient,
    /// Server-simulated entity: computed position applied.
    ServerSimulated,
}

impl Verdict {
    /// Whether the computed pose replaces the current one.
    pub fn commits(self) -> bool {
        matches!(
            self,
            Verdict::ServerAuthoritative(_) | Verdict::ServerSimulated
        )
    }
}

/// Facts about one tick's candidate move, gathered before the decision.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    /// Position after collision and border clamp.
    pub final_position: Vec3,
    /// Resolved per-tick velocity.
    pub velocity: Vec3,
    /// Residency of the chunk containing `final_position`.
    pub gate: Gate,
}

/// Runs the decision table for `entity` and its candidate move.
pub fn decide(entity: &Entity, candidate: &Candidate) -> Verdict {
    if candidate.final_position == entity.pose().position {
        return Verdict::NoDisplacement;
    }
    if entity.velocity_set_this_tick() {
        return Verdict::ExplicitVelocity;
    }
    if candidate.velocity.is_zero() {
        return Verdict::ZeroVelocity;
    }
    if let Gate::NotLoaded(chunk) = candidate.gate {
        return Verdict::ChunkNotLoaded(chunk);
    }
    let kind = entity.kind();
    if kind.is_always_authoritative() {
        return Verdict::ServerAuthoritative(kind);
    }
    if entity.is_remote_controlled() {
        return Verdict::DeferredToClient;
    }
    Verdict::ServerSimulated
}
