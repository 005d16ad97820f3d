//! Kinematic integrator.
//!
//! Advances a pose by one tick. Never touches the entity; the result is a
//! candidate for the authority policy to apply or discard.

use crate::{
    config::TickRate,
    ecs::Entity,
    math::Vec3,
    physics::{BlockQuery, CollisionResolver, PhysicsResult},
    pose::Pose,
};

/// Candidate produced by one integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Integration {
    /// Attached to a vehicle; pose unchanged.
    Passenger,
    /// Nothing to integrate; pose unchanged.
    AtRest,
    /// A candidate move.
    Moved {
        pose: Pose,
        /// Per-tick velocity after collision adjustment.
        velocity: Vec3,
        /// Present when the collision resolver ran.
        physics: Option<PhysicsResult>,
    },
}

/// Computes the candidate pose and velocity for the next tick.
pub fn integrate(
    entity: &Entity,
    rate: TickRate,
    collision: &dyn CollisionResolver,
    blocks: &dyn BlockQuery,
) -> Integration {
    if entity.vehicle().is_some() {
        return Integration::Passenger;
    }
    if !entity.has_velocity() && entity.has_no_gravity() {
        return Integration::AtRest;
    }

    let current = entity.pose();
    let displacement = entity.velocity() / rate.as_f64();

    if entity.has_physics() {
        let result = collision.resolve(blocks, current, displacement, entity.last_physics());
        Integration::Moved {
            pose: result.pose,
            velocity: result.velocity,
            physics: Some(result),
        }
    } else {
        Integration::Moved {
            pose: current.add(displacement),
            velocity: displacement,
            physics: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ecs::{EntityFlags, EntityId, EntityKind, InstanceId},
        physics::{BlockPos, PassThrough},
    };

    struct Empty;

    impl BlockQuery for Empty {
        fn is_solid(&self, _block: BlockPos) -> bool {
            false
        }
    }

    /// Resolver that records nothing and always stops dead.
    struct Wall;

    impl CollisionResolver for Wall {
        fn resolve(
            &self,
            _blocks: &dyn BlockQuery,
            pose: Pose,
            _displacement: Vec3,
            _previous: Option<&PhysicsResult>,
        ) -> PhysicsResult {
            PhysicsResult {
                collision_x: true,
                ..PhysicsResult::unobstructed(pose, Vec3::ZERO)
            }
        }
    }

    fn rate() -> TickRate {
        TickRate::new(20).unwrap()
    }

    fn mob(velocity: Vec3, flags: EntityFlags) -> Entity {
        Entity::new(EntityId(1), EntityKind::Mob, InstanceId(0), Pose::at(0.0, 100.0, 0.0))
            .with_velocity(velocity)
            .with_flags(flags)
    }

    #[test]
    fn passenger_is_left_alone() {
        let mut e = mob(Vec3::new(5.0, 5.0, 5.0), EntityFlags::NONE);
        e.mount(EntityId(2));
        assert_eq!(integrate(&e, rate(), &PassThrough, &Empty), Integration::Passenger);
    }

    #[test]
    fn gravity_exempt_without_velocity_rests() {
        let e = mob(Vec3::ZERO, EntityFlags::NO_GRAVITY);
        assert_eq!(integrate(&e, rate(), &PassThrough, &Empty), Integration::AtRest);
    }

    #[test]
    fn without_physics_displacement_is_velocity_over_rate() {
        let e = mob(Vec3::new(2.0, -10.0, 0.0), EntityFlags::NONE);
        match integrate(&e, rate(), &Wall, &Empty) {
            Integration::Moved {
                pose,
                velocity,
                physics,
            } => {
                assert_eq!(velocity, Vec3::new(0.1, -0.5, 0.0));
                assert_eq!(pose.position, Vec3::new(0.1, 99.5, 0.0));
                assert!(physics.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn physics_delegates_to_resolver() {
        let e = mob(Vec3::new(2.0, 0.0, 0.0), EntityFlags::PHYSICS);
        match integrate(&e, rate(), &Wall, &Empty) {
            Integration::Moved {
                pose,
                velocity,
                physics,
            } => {
                assert_eq!(pose, e.pose());
                assert!(velocity.is_zero());
                assert!(physics.is_some_and(|r| r.collision_x));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gravity_enabled_entity_integrates_even_when_still() {
        let e = mob(Vec3::ZERO, EntityFlags::NONE);
        assert!(matches!(
            integrate(&e, rate(), &PassThrough, &Empty),
            Integration::Moved { .. }
        ));
    }
}
