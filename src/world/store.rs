//! Chunked voxel storage with lazy generation

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::block::{BlockState, Chunk, SECTION_SIZE};
use super::region::{BlockPos, ChunkPos};

/// Stable identity of a world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldId(pub Uuid);

impl WorldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// World errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum WorldError {
    #[error("Chunk generation failed at ({x}, {z}): {reason}")]
    Generation { x: i32, z: i32, reason: String },

    #[error("World executor is closed")]
    ExecutorClosed,

    #[error("Position {0} is outside the world's vertical bounds")]
    OutOfBounds(BlockPos),
}

/// Produces chunks the first time they are touched
pub trait ChunkGenerator: Send {
    fn generate(&mut self, pos: ChunkPos, layout: &WorldLayout) -> Result<Chunk, WorldError>;
}

/// Vertical bounds of a world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldLayout {
    pub min_y: i32,
    /// Multiple of 16
    pub height: i32,
}

impl WorldLayout {
    pub fn new(min_y: i32, height: i32) -> Self {
        let height = (height.max(SECTION_SIZE) / SECTION_SIZE) * SECTION_SIZE;
        Self { min_y, height }
    }

    pub fn max_y(&self) -> i32 {
        self.min_y + self.height - 1
    }

    pub fn section_count(&self) -> usize {
        (self.height / SECTION_SIZE) as usize
    }

    /// Section index holding world height `y`
    pub fn section_index(&self, y: i32) -> Option<usize> {
        if y < self.min_y || y > self.max_y() {
            return None;
        }
        Some(((y - self.min_y) / SECTION_SIZE) as usize)
    }

    /// Lowest world y of a section
    pub fn section_base_y(&self, index: usize) -> i32 {
        self.min_y + index as i32 * SECTION_SIZE
    }
}

impl Default for WorldLayout {
    fn default() -> Self {
        Self::new(-64, 384)
    }
}

/// Flat terrain: bedrock floor, stone, dirt, grass surface, seeded gravel patches
pub struct FlatGenerator {
    seed: u64,
    surface_y: i32,
}

impl FlatGenerator {
    pub fn new(seed: u64, surface_y: i32) -> Self {
        Self { seed, surface_y }
    }

    fn layer_for(&self, y: i32, min_y: i32) -> BlockState {
        if y == min_y {
            BlockState::BEDROCK
        } else if y < self.surface_y - 3 {
            BlockState::STONE
        } else if y < self.surface_y {
            BlockState::DIRT
        } else if y == self.surface_y {
            BlockState::GRASS
        } else {
            BlockState::AIR
        }
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&mut self, pos: ChunkPos, layout: &WorldLayout) -> Result<Chunk, WorldError> {
        let mut chunk = Chunk::empty(layout.section_count());
        let top = self.surface_y.min(layout.max_y());

        for y in layout.min_y..=top {
            let state = self.layer_for(y, layout.min_y);
            if state.is_air() {
                continue;
            }
            let index = layout
                .section_index(y)
                .ok_or(WorldError::OutOfBounds(BlockPos::new(pos.min_block_x(), y, pos.min_block_z())))?;
            let local_y = y - layout.section_base_y(index);
            if let Some(section) = chunk.section_or_insert(index) {
                section.fill_layer(local_y, state);
            }
        }

        // Deterministic per-chunk scatter so every run yields the same map
        let chunk_seed = self.seed
            ^ ((pos.x as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
            ^ ((pos.z as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F));
        let mut rng = ChaCha8Rng::seed_from_u64(chunk_seed);
        if let Some(index) = layout.section_index(top) {
            let local_y = top - layout.section_base_y(index);
            if let Some(section) = chunk.section_mut(index) {
                for _ in 0..rng.gen_range(0..4) {
                    let x = rng.gen_range(0..SECTION_SIZE);
                    let z = rng.gen_range(0..SECTION_SIZE);
                    section.set(x, local_y, z, BlockState::GRAVEL);
                }
            }
        }

        Ok(chunk)
    }
}

/// Authoritative world storage. Owned by exactly one writer.
pub struct ChunkedWorld {
    id: WorldId,
    layout: WorldLayout,
    chunks: HashMap<ChunkPos, Chunk>,
    generator: Box<dyn ChunkGenerator>,
}

impl ChunkedWorld {
    pub fn new(id: WorldId, layout: WorldLayout, generator: Box<dyn ChunkGenerator>) -> Self {
        Self {
            id,
            layout,
            chunks: HashMap::new(),
            generator,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn layout(&self) -> WorldLayout {
        self.layout
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos)
    }

    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Load the chunk, generating it on first access
    pub fn load_chunk(&mut self, pos: ChunkPos) -> Result<&mut Chunk, WorldError> {
        if !self.chunks.contains_key(&pos) {
            let chunk = self.generator.generate(pos, &self.layout)?;
            self.chunks.insert(pos, chunk);
        }
        self.chunks
            .get_mut(&pos)
            .ok_or(WorldError::Generation {
                x: pos.x,
                z: pos.z,
                reason: "chunk vanished after generation".to_string(),
            })
    }

    pub fn block_at(&mut self, pos: BlockPos) -> Result<BlockState, WorldError> {
        let layout = self.layout;
        let index = layout.section_index(pos.y).ok_or(WorldError::OutOfBounds(pos))?;
        let chunk = self.load_chunk(pos.chunk())?;
        Ok(chunk
            .section(index)
            .map(|s| {
                s.get(
                    pos.x.rem_euclid(SECTION_SIZE),
                    pos.y - layout.section_base_y(index),
                    pos.z.rem_euclid(SECTION_SIZE),
                )
            })
            .unwrap_or(BlockState::AIR))
    }

    pub fn set_block(&mut self, pos: BlockPos, state: BlockState) -> Result<(), WorldError> {
        let layout = self.layout;
        let index = layout.section_index(pos.y).ok_or(WorldError::OutOfBounds(pos))?;
        let chunk = self.load_chunk(pos.chunk())?;
        if state.is_air() && chunk.section(index).is_none() {
            return Ok(());
        }
        if let Some(section) = chunk.section_or_insert(index) {
            section.set(
                pos.x.rem_euclid(SECTION_SIZE),
                pos.y - layout.section_base_y(index),
                pos.z.rem_euclid(SECTION_SIZE),
                state,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> ChunkedWorld {
        ChunkedWorld::new(
            WorldId::new(),
            WorldLayout::new(0, 64),
            Box::new(FlatGenerator::new(7, 4)),
        )
    }

    #[test]
    fn layout_maps_heights_to_sections() {
        let layout = WorldLayout::new(-64, 384);
        assert_eq!(layout.section_count(), 24);
        assert_eq!(layout.section_index(-64), Some(0));
        assert_eq!(layout.section_index(-49), Some(0));
        assert_eq!(layout.section_index(-48), Some(1));
        assert_eq!(layout.section_index(319), Some(23));
        assert_eq!(layout.section_index(320), None);
        assert_eq!(layout.section_base_y(1), -48);
    }

    #[test]
    fn flat_generator_layers() {
        let mut world = world();
        assert_eq!(world.block_at(BlockPos::new(3, 0, 3)).unwrap(), BlockState::BEDROCK);
        assert_eq!(world.block_at(BlockPos::new(3, 2, 3)).unwrap(), BlockState::DIRT);
        let surface = world.block_at(BlockPos::new(3, 4, 3)).unwrap();
        assert!(surface == BlockState::GRASS || surface == BlockState::GRAVEL);
        assert!(world.block_at(BlockPos::new(3, 30, 3)).unwrap().is_air());
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let mut a = world();
        let mut b = world();
        for x in 0..16 {
            for z in 0..16 {
                let pos = BlockPos::new(x, 4, z);
                assert_eq!(a.block_at(pos).unwrap(), b.block_at(pos).unwrap());
            }
        }
    }

    #[test]
    fn set_block_populates_sections_lazily() {
        let mut world = world();
        let high = BlockPos::new(-5, 40, 20);
        world.set_block(high, BlockState::AIR).unwrap();
        let chunk_sections = world.load_chunk(high.chunk()).unwrap().populated_sections();
        assert_eq!(chunk_sections, 1);

        world.set_block(high, BlockState::GLASS).unwrap();
        assert_eq!(world.block_at(high).unwrap(), BlockState::GLASS);
        assert_eq!(world.load_chunk(high.chunk()).unwrap().populated_sections(), 2);
    }

    #[test]
    fn out_of_bounds_is_an_error() {
        let mut world = world();
        assert!(matches!(
            world.set_block(BlockPos::new(0, 64, 0), BlockState::STONE),
            Err(WorldError::OutOfBounds(_))
        ));
    }
}
