//! Tick resolution.
//!
//! [`MotionResolver::resolve_tick`] is the single per-entity, per-tick entry
//! point: integrate, clamp to the world border, gate on chunk residency and
//! run the authority policy. It reads the entity and the world and returns a
//! [`TickOutcome`]; the host applies that outcome with [`Entity::commit`].

use tracing::{debug, trace};

use crate::{
    authority::{self, Candidate, Verdict},
    border::BorderClamp,
    chunk::{self, ChunkPos, ChunkResidency},
    config::TickRate,
    ecs::Entity,
    error::KinematicError,
    integrator::{self, Integration},
    math::Vec3,
    physics::{BlockQuery, CollisionResolver, PhysicsResult},
    pose::Pose,
};

/// Everything tick resolution needs to know about the world an entity is in.
pub trait MotionWorld: ChunkResidency + BorderClamp + BlockQuery {}

impl<T: ChunkResidency + BorderClamp + BlockQuery> MotionWorld for T {}

/// State written onto the entity when a tick commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickUpdate {
    pub pose: Pose,
    pub chunk: ChunkPos,
    /// New velocity in blocks per second, when collision adjusted it.
    pub velocity: Option<Vec3>,
    pub physics: Option<PhysicsResult>,
}

/// Result of resolving one entity for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pose: Pose,
    verdict: Verdict,
    update: Option<TickUpdate>,
}

impl TickOutcome {
    fn kept(entity: &Entity, verdict: Verdict) -> Self {
        Self {
            pose: entity.pose(),
            verdict,
            update: None,
        }
    }

    /// The pose the scheduler should hold after this tick.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn committed(&self) -> bool {
        self.update.is_some()
    }

    pub fn update(&self) -> Option<&TickUpdate> {
        self.update.as_ref()
    }
}

/// Resolves entity motion at a fixed tick rate.
pub struct MotionResolver {
    rate: TickRate,
    collision: Box<dyn CollisionResolver>,
}

impl MotionResolver {
    pub fn new(rate: TickRate, collision: Box<dyn CollisionResolver>) -> Self {
        Self { rate, collision }
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Computes the pose `entity` should have after this tick.
    ///
    /// Pure with respect to `entity` and `world`. Non-finite input state or
    /// resolver output is rejected with [`KinematicError`].
    pub fn resolve_tick<W: MotionWorld>(
        &self,
        entity: &Entity,
        world: &W,
    ) -> Result<TickOutcome, KinematicError> {
        let id = entity.id();
        let current = entity.pose();
        if !current.is_finite() {
            return Err(KinematicError::NonFinitePose {
                entity: id,
                pose: current,
            });
        }
        if !entity.velocity().is_finite() {
            return Err(KinematicError::NonFiniteVelocity {
                entity: id,
                velocity: entity.velocity(),
            });
        }

        let (pose, velocity, physics) =
            match integrator::integrate(entity, self.rate, self.collision.as_ref(), world) {
                Integration::Passenger => return Ok(TickOutcome::kept(entity, Verdict::Passenger)),
                Integration::AtRest => return Ok(TickOutcome::kept(entity, Verdict::AtRest)),
                Integration::Moved {
                    pose,
                    velocity,
                    physics,
                } => (pose, velocity, physics),
            };
        if !(pose.is_finite() && velocity.is_finite()) {
            return Err(KinematicError::NonFiniteResolution { entity: id });
        }

        let final_position = world.clamp(current.position, pose.position);
        let gate = chunk::check_destination(world, final_position);
        let verdict = authority::decide(
            entity,
            &Candidate {
                final_position,
                velocity,
                gate,
            },
        );

        if !verdict.commits() {
            match verdict {
                Verdict::ChunkNotLoaded(chunk) => {
                    debug!(entity = ?id, ?chunk, "Move vetoed: destination chunk not loaded")
                }
                _ => trace!(entity = ?id, ?verdict, "Pose kept"),
            }
            return Ok(TickOutcome::kept(entity, verdict));
        }

        let final_pose = pose.with_position(final_position);
        let update = TickUpdate {
            pose: final_pose,
            chunk: gate.chunk(),
            velocity: physics.map(|r| blocked_axes_zeroed(entity.velocity(), &r)),
            physics: physics.map(|r| PhysicsResult {
                pose: final_pose,
                ..r
            }),
        };
        trace!(entity = ?id, ?verdict, position = ?final_position, "Pose committed");
        Ok(TickOutcome {
            pose: final_pose,
            verdict,
            update: Some(update),
        })
    }
}

/// Entity velocity with every axis the resolver collided on set to zero.
fn blocked_axes_zeroed(velocity: Vec3, result: &PhysicsResult) -> Vec3 {
    Vec3::new(
        if result.collision_x { 0.0 } else { velocity.x },
        if result.collision_y { 0.0 } else { velocity.y },
        if result.collision_z { 0.0 } else { velocity.z },
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::{
        border::WorldBorder,
        chunk::ChunkMap,
        ecs::{ClientId, EntityFlags, EntityId, EntityKind, InstanceId},
        physics::{BlockCollision, BlockPos, PassThrough},
    };

    struct TestWorld {
        chunks: ChunkMap,
        border: WorldBorder,
        solid: HashSet<BlockPos>,
    }

    impl TestWorld {
        fn loaded() -> Self {
            let mut chunks = ChunkMap::new();
            chunks.load_square(ChunkPos::new(0, 0), 2);
            Self {
                chunks,
                border: WorldBorder::default(),
                solid: HashSet::new(),
            }
        }
    }

    impl ChunkResidency for TestWorld {
        fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
            self.chunks.is_chunk_loaded(chunk)
        }
    }

    impl BorderClamp for TestWorld {
        fn clamp(&self, old: Vec3, candidate: Vec3) -> Vec3 {
            self.border.clamp(old, candidate)
        }
    }

    impl BlockQuery for TestWorld {
        fn is_solid(&self, block: BlockPos) -> bool {
            self.solid.contains(&block)
        }
    }

    /// Resolver that returns NaN, standing in for a broken geometry engine.
    struct Broken;

    impl CollisionResolver for Broken {
        fn resolve(
            &self,
            _blocks: &dyn BlockQuery,
            pose: Pose,
            _displacement: Vec3,
            _previous: Option<&PhysicsResult>,
        ) -> PhysicsResult {
            PhysicsResult::unobstructed(pose.add(Vec3::new(f64::NAN, 0.0, 0.0)), Vec3::ZERO)
        }
    }

    fn resolver() -> MotionResolver {
        MotionResolver::new(TickRate::new(20).unwrap(), Box::new(PassThrough))
    }

    fn falling(kind: EntityKind) -> Entity {
        Entity::new(EntityId(1), kind, InstanceId(0), Pose::at(0.0, 100.0, 0.0))
            .with_velocity(Vec3::new(0.0, -9.8, 0.0))
            .with_flags(EntityFlags::NONE)
    }

    #[test]
    fn free_falling_item_moves() {
        let world = TestWorld::loaded();
        let out = resolver().resolve_tick(&falling(EntityKind::Item), &world).unwrap();
        assert!(out.committed());
        assert!((out.pose().position.y - 99.51).abs() < 1e-9);
        assert_eq!(out.verdict(), Verdict::ServerAuthoritative(EntityKind::Item));
    }

    #[test]
    fn unloaded_destination_keeps_pose() {
        let world = TestWorld {
            chunks: ChunkMap::new(),
            ..TestWorld::loaded()
        };
        let e = falling(EntityKind::Item);
        let out = resolver().resolve_tick(&e, &world).unwrap();
        assert_eq!(out.pose(), e.pose());
        assert_eq!(out.verdict(), Verdict::ChunkNotLoaded(ChunkPos::new(0, 0)));
        assert!(out.update().is_none());
    }

    #[test]
    fn remote_player_keeps_reported_pose() {
        let world = TestWorld::loaded();
        let e = falling(EntityKind::Player).with_controller(ClientId(9));
        let out = resolver().resolve_tick(&e, &world).unwrap();
        assert_eq!(out.pose(), e.pose());
        assert_eq!(out.verdict(), Verdict::DeferredToClient);
    }

    #[test]
    fn passenger_ignores_velocity() {
        let world = TestWorld::loaded();
        let mut e = falling(EntityKind::Mob);
        e.mount(EntityId(2));
        let out = resolver().resolve_tick(&e, &world).unwrap();
        assert_eq!(out.pose(), e.pose());
        assert_eq!(out.verdict(), Verdict::Passenger);
    }

    #[test]
    fn border_clamp_applies_before_commit() {
        let world = TestWorld {
            border: WorldBorder::new(0.0, 0.0, 20.0),
            ..TestWorld::loaded()
        };
        let e = Entity::new(EntityId(1), EntityKind::Mob, InstanceId(0), Pose::at(9.9, 64.0, 0.0))
            .with_velocity(Vec3::new(20.0, -20.0, 0.0))
            .with_flags(EntityFlags::NONE);
        let out = resolver().resolve_tick(&e, &world).unwrap();
        assert!(out.committed());
        assert_eq!(out.pose().position.x, 9.9);
        assert_eq!(out.pose().position.y, 63.0);
    }

    #[test]
    fn non_finite_velocity_is_rejected_before_integration() {
        let world = TestWorld::loaded();
        let e = falling(EntityKind::Item).with_velocity(Vec3::new(0.0, f64::INFINITY, 0.0));
        let err = resolver().resolve_tick(&e, &world).unwrap_err();
        assert!(matches!(err, KinematicError::NonFiniteVelocity { .. }));
    }

    #[test]
    fn non_finite_pose_is_rejected() {
        let world = TestWorld::loaded();
        let e = Entity::new(
            EntityId(1),
            EntityKind::Item,
            InstanceId(0),
            Pose::at(f64::NAN, 0.0, 0.0),
        );
        let err = resolver().resolve_tick(&e, &world).unwrap_err();
        assert!(matches!(err, KinematicError::NonFinitePose { .. }));
    }

    #[test]
    fn broken_resolver_output_never_commits() {
        let world = TestWorld::loaded();
        let e = falling(EntityKind::Item).with_flags(EntityFlags::PHYSICS);
        let r = MotionResolver::new(TickRate::new(20).unwrap(), Box::new(Broken));
        let err = r.resolve_tick(&e, &world).unwrap_err();
        assert_eq!(err, KinematicError::NonFiniteResolution { entity: EntityId(1) });
    }

    fn floor_world() -> TestWorld {
        let mut world = TestWorld::loaded();
        for x in -1..=2 {
            world.solid.insert(BlockPos::new(x, 99, 0));
        }
        world
    }

    #[test]
    fn sliding_landing_commits_and_caches_physics() {
        let world = floor_world();
        let r = MotionResolver::new(TickRate::new(20).unwrap(), Box::new(BlockCollision));
        let mut e = Entity::new(EntityId(1), EntityKind::Mob, InstanceId(0), Pose::at(0.5, 100.2, 0.5))
            .with_velocity(Vec3::new(2.0, -9.8, 0.0));

        let out = r.resolve_tick(&e, &world).unwrap();
        assert_eq!(out.verdict(), Verdict::ServerSimulated);
        e.commit(&out);

        assert!(e.is_on_ground());
        assert_eq!(e.velocity(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(e.last_physics().map(|p| p.pose), Some(e.pose()));
        assert!(e.pose().position.y > 100.0 && e.pose().position.y < 100.001);

        // Keeps sliding along the floor without sinking into it.
        let next = r.resolve_tick(&e, &world).unwrap();
        assert!(next.committed());
        e.commit(&next);
        assert!(e.is_on_ground());
        assert!(e.pose().position.y > 100.0);
        assert!(e.pose().position.x > 0.6);
    }

    #[test]
    fn vertical_landing_resolves_to_zero_velocity() {
        let world = floor_world();
        let r = MotionResolver::new(TickRate::new(20).unwrap(), Box::new(BlockCollision));
        let e = Entity::new(EntityId(1), EntityKind::Mob, InstanceId(0), Pose::at(0.5, 100.2, 0.5))
            .with_velocity(Vec3::new(0.0, -9.8, 0.0));

        let out = r.resolve_tick(&e, &world).unwrap();
        assert_eq!(out.verdict(), Verdict::ZeroVelocity);
        assert_eq!(out.pose(), e.pose());
    }

    #[test]
    fn explicit_velocity_holds_for_one_tick() {
        let world = TestWorld::loaded();
        let mut e = falling(EntityKind::Mob);
        e.set_velocity(Vec3::new(0.0, -9.8, 0.0));

        let first = resolver().resolve_tick(&e, &world).unwrap();
        assert_eq!(first.verdict(), Verdict::ExplicitVelocity);
        e.commit(&first);
        assert_eq!(e.pose(), Pose::at(0.0, 100.0, 0.0));

        let second = resolver().resolve_tick(&e, &world).unwrap();
        assert_eq!(second.verdict(), Verdict::ServerSimulated);
    }
}
