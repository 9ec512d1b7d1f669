//! Integer-coordinate geometry: block/chunk positions and axis-aligned regions

use serde::{Deserialize, Serialize};
use std::fmt;

use super::block::SECTION_SIZE;

/// A single cell coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x.div_euclid(SECTION_SIZE), self.z.div_euclid(SECTION_SIZE))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Column coordinate of a chunk (16×16 cells wide)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub fn min_block_x(&self) -> i32 {
        self.x * SECTION_SIZE
    }

    pub fn min_block_z(&self) -> i32 {
        self.z * SECTION_SIZE
    }
}

/// Continuous position of a participant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_sq(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

/// Axis-aligned volume, both corners inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    min: BlockPos,
    max: BlockPos,
}

impl Region {
    /// Build a region from any two opposite corners
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Single-cell region
    pub fn single(pos: BlockPos) -> Self {
        Self { min: pos, max: pos }
    }

    pub fn min(&self) -> BlockPos {
        self.min
    }

    pub fn max(&self) -> BlockPos {
        self.max
    }

    /// Number of cells covered
    pub fn volume(&self) -> u64 {
        let dx = (self.max.x as i64 - self.min.x as i64 + 1) as u64;
        let dy = (self.max.y as i64 - self.min.y as i64 + 1) as u64;
        let dz = (self.max.z as i64 - self.min.z as i64 + 1) as u64;
        dx * dy * dz
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    pub fn contains_point(&self, point: &Vec3) -> bool {
        self.contains(point.block())
    }

    pub fn intersects(&self, other: &Region) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Overlapping part of two regions, if any
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        if !self.intersects(other) {
            return None;
        }
        Some(Region {
            min: BlockPos::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: BlockPos::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        })
    }

    /// Chunk columns touched by this region, row-major in x then z
    pub fn chunk_span(&self) -> impl Iterator<Item = ChunkPos> {
        let lo = self.min.chunk();
        let hi = self.max.chunk();
        (lo.x..=hi.x).flat_map(move |x| (lo.z..=hi.z).map(move |z| ChunkPos::new(x, z)))
    }

    pub fn chunk_count(&self) -> usize {
        let lo = self.min.chunk();
        let hi = self.max.chunk();
        ((hi.x - lo.x + 1) as usize) * ((hi.z - lo.z + 1) as usize)
    }

    /// Center of the region floor, useful as a fallback spawn
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            (self.min.x as f64 + self.max.x as f64 + 1.0) / 2.0,
            self.min.y as f64,
            (self.min.z as f64 + self.max.z as f64 + 1.0) / 2.0,
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_are_normalized() {
        let region = Region::new(BlockPos::new(5, 10, -3), BlockPos::new(-1, 2, 4));
        assert_eq!(region.min(), BlockPos::new(-1, 2, -3));
        assert_eq!(region.max(), BlockPos::new(5, 10, 4));
    }

    #[test]
    fn volume_is_inclusive() {
        assert_eq!(Region::single(BlockPos::new(3, 3, 3)).volume(), 1);
        let region = Region::new(BlockPos::new(0, 0, 0), BlockPos::new(1, 2, 3));
        assert_eq!(region.volume(), 2 * 3 * 4);
    }

    #[test]
    fn containment_and_overlap() {
        let region = Region::new(BlockPos::new(0, 0, 0), BlockPos::new(9, 9, 9));
        assert!(region.contains(BlockPos::new(9, 0, 5)));
        assert!(!region.contains(BlockPos::new(10, 0, 5)));
        assert!(region.contains_point(&Vec3::new(9.9, 0.1, 0.0)));
        assert!(!region.contains_point(&Vec3::new(-0.1, 0.0, 0.0)));

        let other = Region::new(BlockPos::new(9, 9, 9), BlockPos::new(20, 20, 20));
        assert!(region.intersects(&other));
        assert_eq!(
            region.intersection(&other),
            Some(Region::single(BlockPos::new(9, 9, 9)))
        );
        let apart = Region::new(BlockPos::new(10, 0, 0), BlockPos::new(12, 0, 0));
        assert!(!region.intersects(&apart));
        assert_eq!(region.intersection(&apart), None);
    }

    #[test]
    fn chunk_span_covers_negative_coordinates() {
        let region = Region::new(BlockPos::new(-1, 0, -1), BlockPos::new(16, 0, 0));
        let chunks: Vec<_> = region.chunk_span().collect();
        assert_eq!(region.chunk_count(), 6);
        assert_eq!(
            chunks,
            vec![
                ChunkPos::new(-1, -1),
                ChunkPos::new(-1, 0),
                ChunkPos::new(0, -1),
                ChunkPos::new(0, 0),
                ChunkPos::new(1, -1),
                ChunkPos::new(1, 0),
            ]
        );
    }
}
