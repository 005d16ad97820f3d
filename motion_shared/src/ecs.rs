//! Entities and their storage.
//!
//! Entities are plain aggregates kept in an id-ordered store. Iteration order
//! is stable so that tick resolution is deterministic.

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicU32, Ordering},
};

use serde::{Deserialize, Serialize};

use crate::{
    chunk::ChunkPos,
    math::Vec3,
    motion::TickOutcome,
    physics::PhysicsResult,
    pose::Pose,
};

static NEXT_CLIENT_ID: AtomicU32 = AtomicU32::new(1);

/// Opaque entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Identifies a client connected over a network socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub u32);

impl ClientId {
    pub fn new_unique() -> Self {
        ClientId(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifies a world instance (dimension, arena, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u32);

/// Entity kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Player,
    Item,
    FallingBlock,
    Mob,
    Projectile,
    Other,
}

impl EntityKind {
    /// Kinds whose position the server always decides, whoever controls them.
    pub fn is_always_authoritative(self) -> bool {
        matches!(self, EntityKind::Item | EntityKind::FallingBlock)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "player" => Some(EntityKind::Player),
            "item" => Some(EntityKind::Item),
            "falling_block" | "fallingblock" => Some(EntityKind::FallingBlock),
            "mob" => Some(EntityKind::Mob),
            "projectile" => Some(EntityKind::Projectile),
            "other" => Some(EntityKind::Other),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Per-entity simulation switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntityFlags: u32 {
        const NONE = 0;
        /// Exempt from gravity.
        const NO_GRAVITY = 1 << 0;
        /// Movement goes through the collision resolver.
        const PHYSICS = 1 << 1;
    }
}

/// One simulated entity.
#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    instance: InstanceId,
    pose: Pose,
    velocity: Vec3,
    velocity_set_this_tick: bool,
    flags: EntityFlags,
    vehicle: Option<EntityId>,
    controller: Option<ClientId>,
    last_physics: Option<PhysicsResult>,
    chunk: ChunkPos,
}

impl Entity {
    pub fn new(id: EntityId, kind: EntityKind, instance: InstanceId, pose: Pose) -> Self {
        Self {
            id,
            kind,
            instance,
            pose,
            velocity: Vec3::ZERO,
            velocity_set_this_tick: false,
            flags: EntityFlags::PHYSICS,
            vehicle: None,
            controller: None,
            last_physics: None,
            chunk: ChunkPos::of(pose.position),
        }
    }

    pub fn with_flags(mut self, flags: EntityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_controller(mut self, client: ClientId) -> Self {
        self.controller = Some(client);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    pub fn has_no_gravity(&self) -> bool {
        self.flags.contains(EntityFlags::NO_GRAVITY)
    }

    pub fn has_physics(&self) -> bool {
        self.flags.contains(EntityFlags::PHYSICS)
    }

    pub fn vehicle(&self) -> Option<EntityId> {
        self.vehicle
    }

    pub fn controller(&self) -> Option<ClientId> {
        self.controller
    }

    /// Position arrives through client reports rather than simulation.
    pub fn is_remote_controlled(&self) -> bool {
        self.controller.is_some()
    }

    pub fn last_physics(&self) -> Option<&PhysicsResult> {
        self.last_physics.as_ref()
    }

    /// Last known chunk, updated whenever a pose is committed or reported.
    pub fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    pub fn is_on_ground(&self) -> bool {
        self.last_physics.as_ref().is_some_and(|r| r.on_ground)
    }

    /// Whether the entity is moving under its own velocity.
    ///
    /// Resting on the ground with only downward velocity does not count.
    pub fn has_velocity(&self) -> bool {
        let v = self.velocity;
        if self.is_on_ground() {
            v.x != 0.0 || v.z != 0.0 || v.y > 0.0
        } else {
            !v.is_zero()
        }
    }

    /// Whether gameplay code assigned the velocity during the current tick.
    pub fn velocity_set_this_tick(&self) -> bool {
        self.velocity_set_this_tick
    }

    /// Gameplay-driven velocity change. Marks the velocity as explicitly set
    /// for the current tick.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.velocity_set_this_tick = true;
    }

    /// Physics-driven acceleration (gravity, drag). Does not count as an
    /// explicit gameplay assignment.
    pub fn accelerate(&mut self, delta: Vec3) {
        self.velocity = self.velocity + delta;
    }

    pub fn set_flags(&mut self, flags: EntityFlags) {
        self.flags = flags;
    }

    pub fn mount(&mut self, vehicle: EntityId) {
        self.vehicle = Some(vehicle);
    }

    pub fn dismount(&mut self) {
        self.vehicle = None;
    }

    pub fn set_controller(&mut self, controller: Option<ClientId>) {
        self.controller = controller;
    }

    /// Moves the entity outside of tick resolution (spawn, teleport).
    /// Clears the cached physics result since it no longer describes the
    /// entity's surroundings.
    pub fn teleport(&mut self, pose: Pose) {
        self.pose = pose;
        self.chunk = ChunkPos::of(pose.position);
        self.last_physics = None;
    }

    /// Applies a pose reported by the controlling client.
    pub fn apply_report(&mut self, pose: Pose) {
        self.pose = pose;
        self.chunk = ChunkPos::of(pose.position);
    }

    /// Moves a passenger along with its vehicle; view direction is kept.
    pub fn carry_to(&mut self, position: Vec3) {
        self.pose = self.pose.with_position(position);
        self.chunk = ChunkPos::of(position);
    }

    /// Applies the result of one tick's resolution in a single update.
    ///
    /// When the outcome commits, pose, last known chunk and (if the
    /// collision resolver ran) velocity and cached physics result change
    /// together. Otherwise only the per-tick explicit-velocity marker is
    /// reset.
    pub fn commit(&mut self, outcome: &TickOutcome) {
        if let Some(update) = outcome.update() {
            self.pose = update.pose;
            self.chunk = update.chunk;
            if let Some(velocity) = update.velocity {
                self.velocity = velocity;
            }
            if let Some(result) = update.physics {
                self.last_physics = Some(result);
            }
        }
        self.velocity_set_this_tick = false;
    }
}

/// Id-ordered entity storage.
#[derive(Debug, Default)]
pub struct EntityStore {
    next_id: u64,
    entities: BTreeMap<EntityId, Entity>,
}

impl EntityStore {
    /// Allocates an id and stores the entity built by `make`.
    pub fn spawn(&mut self, make: impl FnOnce(EntityId) -> Entity) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(id, make(id));
        id
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates entities in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }
}
