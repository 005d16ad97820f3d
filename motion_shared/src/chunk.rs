//! Chunk addressing and the residency gate.
//!
//! The world is split into 16-block-wide vertical columns. A tick may only
//! move an entity into a column the server currently holds in memory.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Width of a chunk column in blocks.
pub const CHUNK_SIZE: i32 = 16;

const CHUNK_SHIFT: u32 = 4;

/// Chunk column coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk column containing a world position.
    pub fn of(position: Vec3) -> Self {
        Self::new(coordinate(position.x), coordinate(position.z))
    }
}

fn coordinate(xz: f64) -> i32 {
    (xz.floor() as i32) >> CHUNK_SHIFT
}

/// Read access to chunk residency.
pub trait ChunkResidency: Send + Sync {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool;
}

/// Result of checking a destination against the residency gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Destination chunk is resident; the move may proceed.
    Resident(ChunkPos),
    /// Destination chunk is not in memory; the move is vetoed.
    NotLoaded(ChunkPos),
}

impl Gate {
    pub fn chunk(self) -> ChunkPos {
        match self {
            Gate::Resident(c) | Gate::NotLoaded(c) => c,
        }
    }
}

/// Checks whether `destination` lies in a resident chunk.
pub fn check_destination<R: ChunkResidency + ?Sized>(residency: &R, destination: Vec3) -> Gate {
    let chunk = ChunkPos::of(destination);
    if residency.is_chunk_loaded(chunk) {
        Gate::Resident(chunk)
    } else {
        Gate::NotLoaded(chunk)
    }
}

/// Set of resident chunk columns.
#[derive(Debug, Default, Clone)]
pub struct ChunkMap {
    resident: HashSet<ChunkPos>,
}

impl ChunkMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a chunk resident. Returns false if it already was.
    pub fn load(&mut self, chunk: ChunkPos) -> bool {
        self.resident.insert(chunk)
    }

    /// Evicts a chunk. Returns false if it was not resident.
    pub fn unload(&mut self, chunk: ChunkPos) -> bool {
        self.resident.remove(&chunk)
    }

    /// Loads every chunk within a square of `radius` around `center`.
    pub fn load_square(&mut self, center: ChunkPos, radius: i32) -> usize {
        let radius = radius.max(0);
        let mut added = 0;
        for x in center.x - radius..=center.x + radius {
            for z in center.z - radius..=center.z + radius {
                if self.load(ChunkPos::new(x, z)) {
                    added += 1;
                }
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.resident.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.resident.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }
}

impl ChunkResidency for ChunkMap {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.resident.contains(&chunk)
    }
}
