//! Cell states and chunk storage

use serde::{Deserialize, Serialize};

/// Edge length of a chunk section (cells)
pub const SECTION_SIZE: i32 = 16;
const SECTION_CELLS: usize = (SECTION_SIZE * SECTION_SIZE * SECTION_SIZE) as usize;

/// Opaque cell state identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockState(pub u16);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);
    pub const STONE: BlockState = BlockState(1);
    pub const DIRT: BlockState = BlockState(2);
    pub const GRASS: BlockState = BlockState(3);
    pub const BEDROCK: BlockState = BlockState(4);
    pub const GRAVEL: BlockState = BlockState(5);
    pub const GLASS: BlockState = BlockState(6);
    /// Placed by map builders to mark round spawn points
    pub const SPAWN_MARKER: BlockState = BlockState(7);
    pub const YELLOW_WOOL: BlockState = BlockState(8);
    pub const BLUE_WOOL: BlockState = BlockState(9);

    pub fn is_air(&self) -> bool {
        *self == Self::AIR
    }
}

/// 16×16×16 cube of cells. Only allocated once something non-air lives in it.
#[derive(Clone)]
pub struct Section {
    cells: Box<[BlockState; SECTION_CELLS]>,
}

impl Section {
    pub fn new() -> Self {
        Self {
            cells: Box::new([BlockState::AIR; SECTION_CELLS]),
        }
    }

    fn index(x: i32, y: i32, z: i32) -> usize {
        ((y as usize) << 8) | ((z as usize) << 4) | x as usize
    }

    /// Local coordinates, each in `0..16`
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockState {
        self.cells[Self::index(x, y, z)]
    }

    pub fn set(&mut self, x: i32, y: i32, z: i32, state: BlockState) {
        self.cells[Self::index(x, y, z)] = state;
    }

    pub fn fill_layer(&mut self, y: i32, state: BlockState) {
        let start = Self::index(0, y, 0);
        self.cells[start..start + 256].fill(state);
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

/// Vertical column of sections
pub struct Chunk {
    sections: Vec<Option<Section>>,
}

impl Chunk {
    pub fn empty(section_count: usize) -> Self {
        Self {
            sections: (0..section_count).map(|_| None).collect(),
        }
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index).and_then(|s| s.as_ref())
    }

    pub fn section_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_mut(index).and_then(|s| s.as_mut())
    }

    /// Section at `index`, allocating it if unpopulated
    pub fn section_or_insert(&mut self, index: usize) -> Option<&mut Section> {
        self.sections
            .get_mut(index)
            .map(|slot| slot.get_or_insert_with(Section::new))
    }

    pub fn populated_sections(&self) -> usize {
        self.sections.iter().filter(|s| s.is_some()).count()
    }
}
