//! World instances.
//!
//! An instance bundles what tick resolution reads about one world: its
//! border, the set of resident chunks and the solid blocks inside them.
//! Terrain generation and chunk persistence live elsewhere; this is only the
//! in-memory view.

use std::collections::HashSet;

use crate::{
    border::{BorderClamp, WorldBorder},
    chunk::{ChunkMap, ChunkPos, ChunkResidency, CHUNK_SIZE},
    ecs::InstanceId,
    math::Vec3,
    physics::{BlockPos, BlockQuery},
};

#[derive(Debug, Clone)]
pub struct Instance {
    id: InstanceId,
    border: WorldBorder,
    chunks: ChunkMap,
    solid: HashSet<BlockPos>,
}

impl Instance {
    pub fn new(id: InstanceId, border: WorldBorder) -> Self {
        Self {
            id,
            border,
            chunks: ChunkMap::new(),
            solid: HashSet::new(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn border(&self) -> &WorldBorder {
        &self.border
    }

    pub fn set_border(&mut self, border: WorldBorder) {
        self.border = border;
    }

    pub fn chunks(&self) -> &ChunkMap {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut ChunkMap {
        &mut self.chunks
    }

    /// Unloads a chunk and forgets its blocks.
    pub fn unload_chunk(&mut self, chunk: ChunkPos) -> bool {
        let unloaded = self.chunks.unload(chunk);
        if unloaded {
            self.solid.retain(|b| block_chunk(*b) != chunk);
        }
        unloaded
    }

    pub fn set_solid(&mut self, block: BlockPos, solid: bool) {
        if solid {
            self.solid.insert(block);
        } else {
            self.solid.remove(&block);
        }
    }

    /// Fills one horizontal layer of every resident chunk with solid blocks.
    pub fn fill_layer(&mut self, y: i32) -> usize {
        let chunks: Vec<ChunkPos> = self.chunks.iter().collect();
        let mut placed = 0;
        for chunk in chunks {
            let (bx, bz) = (chunk.x * CHUNK_SIZE, chunk.z * CHUNK_SIZE);
            for x in bx..bx + CHUNK_SIZE {
                for z in bz..bz + CHUNK_SIZE {
                    if self.solid.insert(BlockPos::new(x, y, z)) {
                        placed += 1;
                    }
                }
            }
        }
        placed
    }

    pub fn solid_count(&self) -> usize {
        self.solid.len()
    }
}

fn block_chunk(block: BlockPos) -> ChunkPos {
    ChunkPos::of(Vec3::new(block.x as f64, 0.0, block.z as f64))
}

impl ChunkResidency for Instance {
    fn is_chunk_loaded(&self, chunk: ChunkPos) -> bool {
        self.chunks.is_chunk_loaded(chunk)
    }
}

impl BorderClamp for Instance {
    fn clamp(&self, old: Vec3, candidate: Vec3) -> Vec3 {
        self.border.clamp(old, candidate)
    }
}

impl BlockQuery for Instance {
    /// Blocks in non-resident chunks are never solid; the chunk gate vetoes
    /// moves into them anyway.
    fn is_solid(&self, block: BlockPos) -> bool {
        self.solid.contains(&block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_layer_covers_resident_chunks() {
        let mut inst = Instance::new(InstanceId(0), WorldBorder::default());
        inst.chunks_mut().load(ChunkPos::new(0, 0));
        inst.chunks_mut().load(ChunkPos::new(-1, 0));
        assert_eq!(inst.fill_layer(63), 512);
        assert!(inst.is_solid(BlockPos::new(-16, 63, 15)));
        assert!(!inst.is_solid(BlockPos::new(16, 63, 0)));
    }

    #[test]
    fn unloading_drops_blocks() {
        let mut inst = Instance::new(InstanceId(0), WorldBorder::default());
        inst.chunks_mut().load(ChunkPos::new(0, 0));
        inst.chunks_mut().load(ChunkPos::new(1, 0));
        inst.fill_layer(0);
        assert!(inst.unload_chunk(ChunkPos::new(1, 0)));
        assert_eq!(inst.solid_count(), 256);
        assert!(!inst.is_chunk_loaded(ChunkPos::new(1, 0)));
        assert!(!inst.unload_chunk(ChunkPos::new(1, 0)));
    }

    #[test]
    fn border_clamp_delegates() {
        let inst = Instance::new(InstanceId(0), WorldBorder::new(0.0, 0.0, 10.0));
        let old = Vec3::new(4.0, 0.0, 0.0);
        assert_eq!(inst.clamp(old, Vec3::new(6.0, 1.0, 0.0)), Vec3::new(4.0, 1.0, 0.0));
    }
}
