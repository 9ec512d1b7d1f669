//! Voxel world collaborator: geometry, storage and the single-writer executor

pub mod block;
pub mod executor;
pub mod region;
pub mod store;

pub use block::{BlockState, Chunk, Section, SECTION_SIZE};
pub use executor::{panic_message, WorldExecutor, WorldHandle, WorldJob};
pub use region::{BlockPos, ChunkPos, Region, Vec3};
pub use store::{ChunkGenerator, ChunkedWorld, FlatGenerator, WorldError, WorldId, WorldLayout};
