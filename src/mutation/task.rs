//! A coalesced batch of operations executed as one pass over a region

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot;
use tracing::{debug, error};

use super::MutationError;
use crate::world::{panic_message, BlockPos, BlockState, ChunkedWorld, Region, WorldId, SECTION_SIZE};

/// Cell mutator: return `Some` to replace the cell
pub type EditFn = Box<dyn FnMut(BlockPos, BlockState) -> Option<BlockState> + Send + 'static>;

/// Cell predicate: return `true` to record the position
pub type SearchFn = Box<dyn FnMut(BlockPos, BlockState) -> bool + Send + 'static>;

pub(crate) enum Operation {
    Edit {
        action: EditFn,
        done: oneshot::Sender<Result<(), MutationError>>,
    },
    Search {
        predicate: SearchFn,
        matches: Vec<BlockPos>,
        done: oneshot::Sender<Result<Vec<BlockPos>, MutationError>>,
    },
}

impl Operation {
    fn visit(&mut self, pos: BlockPos, current: &mut BlockState) {
        match self {
            Operation::Edit { action, .. } => {
                if let Some(replacement) = action(pos, *current) {
                    *current = replacement;
                }
            }
            Operation::Search {
                predicate, matches, ..
            } => {
                if predicate(pos, *current) {
                    matches.push(pos);
                }
            }
        }
    }

    fn complete(self) {
        // A dropped receiver just means nobody is waiting
        match self {
            Operation::Edit { done, .. } => {
                let _ = done.send(Ok(()));
            }
            Operation::Search { matches, done, .. } => {
                let _ = done.send(Ok(matches));
            }
        }
    }

    fn fail(self, cause: MutationError) {
        match self {
            Operation::Edit { done, .. } => {
                let _ = done.send(Err(cause));
            }
            Operation::Search { done, .. } => {
                let _ = done.send(Err(cause));
            }
        }
    }
}

/// All operations sharing one `(world, region)` key at flush time
pub(crate) struct MutationTask {
    world: WorldId,
    region: Region,
    operations: Vec<Operation>,
}

impl MutationTask {
    pub(crate) fn new(world: WorldId, region: Region, operations: Vec<Operation>) -> Self {
        Self {
            world,
            region,
            operations,
        }
    }

    pub(crate) fn volume(&self) -> u64 {
        self.region.volume()
    }

    /// Run the shared pass on the writer thread, then settle every completion.
    /// Writes applied before a failure stay in place.
    pub(crate) fn execute(mut self, world: &mut ChunkedWorld) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.pass(world))).unwrap_or_else(|panic| {
            Err(MutationError::ActionPanicked(panic_message(panic.as_ref())))
        });

        match outcome {
            Ok(visited) => {
                debug!(
                    world = %self.world,
                    region = %self.region,
                    operations = self.operations.len(),
                    visited,
                    "Mutation task complete"
                );
                for op in self.operations {
                    op.complete();
                }
            }
            Err(cause) => {
                error!(
                    world = %self.world,
                    region = %self.region,
                    operations = self.operations.len(),
                    error = %cause,
                    "Mutation task failed"
                );
                self.fail(cause);
            }
        }
    }

    pub(crate) fn fail(self, cause: MutationError) {
        for op in self.operations {
            op.fail(cause.clone());
        }
    }

    /// Visit every populated cell of the region once, applying all operations
    /// in enqueue order. Returns the number of cells visited.
    fn pass(&mut self, world: &mut ChunkedWorld) -> Result<u64, MutationError> {
        let layout = world.layout();
        let (min, max) = (self.region.min(), self.region.max());
        let lo_y = min.y.max(layout.min_y);
        let hi_y = max.y.min(layout.max_y());
        let (Some(first_section), Some(last_section)) =
            (layout.section_index(lo_y), layout.section_index(hi_y))
        else {
            return Ok(0);
        };

        let mut visited = 0u64;
        for chunk_pos in self.region.chunk_span() {
            let chunk = world.load_chunk(chunk_pos)?;
            let (base_x, base_z) = (chunk_pos.min_block_x(), chunk_pos.min_block_z());
            let (x0, x1) = (min.x.max(base_x), max.x.min(base_x + SECTION_SIZE - 1));
            let (z0, z1) = (min.z.max(base_z), max.z.min(base_z + SECTION_SIZE - 1));

            for index in first_section..=last_section {
                let Some(section) = chunk.section_mut(index) else {
                    continue;
                };
                let base_y = layout.section_base_y(index);
                let (y0, y1) = (lo_y.max(base_y), hi_y.min(base_y + SECTION_SIZE - 1));

                for y in y0..=y1 {
                    for z in z0..=z1 {
                        for x in x0..=x1 {
                            let (lx, ly, lz) = (x - base_x, y - base_y, z - base_z);
                            let original = section.get(lx, ly, lz);
                            let mut current = original;
                            let pos = BlockPos::new(x, y, z);
                            for op in self.operations.iter_mut() {
                                op.visit(pos, &mut current);
                            }
                            if current != original {
                                section.set(lx, ly, lz, current);
                            }
                            visited += 1;
                        }
                    }
                }
            }
        }
        Ok(visited)
    }
}
