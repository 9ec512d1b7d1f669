//! Pending-operation map and per-tick flush

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::task::{EditFn, MutationTask, Operation, SearchFn};
use super::{Completion, MutationError};
use crate::world::{BlockPos, BlockState, Region, WorldError, WorldHandle, WorldId};

type TaskKey = (WorldId, Region);

struct PendingTask {
    world: WorldHandle,
    /// Order in which the key was first seen, for stable flush ordering
    first_seen: u64,
    operations: Vec<Operation>,
}

#[derive(Default)]
struct PendingMap {
    tasks: HashMap<TaskKey, PendingTask>,
    next_seq: u64,
}

/// Coalescing front-end for world edits and searches
#[derive(Default)]
pub struct MutationEngine {
    pending: Mutex<PendingMap>,
}

impl MutationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a cell mutator over `region`. Resolves after the next flush's pass.
    pub fn edit<F>(&self, world: &WorldHandle, region: Region, action: F) -> Completion<()>
    where
        F: FnMut(BlockPos, BlockState) -> Option<BlockState> + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let action: EditFn = Box::new(action);
        self.enqueue(world, region, Operation::Edit { action, done });
        Completion::new(rx)
    }

    /// Queue a read-only scan over `region`. Resolves with every matching position.
    pub fn search<P>(&self, world: &WorldHandle, region: Region, predicate: P) -> Completion<Vec<BlockPos>>
    where
        P: FnMut(BlockPos, BlockState) -> bool + Send + 'static,
    {
        let (done, rx) = oneshot::channel();
        let predicate: SearchFn = Box::new(predicate);
        self.enqueue(
            world,
            region,
            Operation::Search {
                predicate,
                matches: Vec::new(),
                done,
            },
        );
        Completion::new(rx)
    }

    fn enqueue(&self, world: &WorldHandle, region: Region, op: Operation) {
        let mut pending = self.pending.lock();
        let seq = pending.next_seq;
        let entry = pending
            .tasks
            .entry((world.id(), region))
            .or_insert_with(|| PendingTask {
                world: world.clone(),
                first_seen: seq,
                operations: Vec::new(),
            });
        entry.operations.push(op);
        pending.next_seq += 1;
    }

    /// Number of distinct `(world, region)` keys waiting for a flush
    pub fn pending_tasks(&self) -> usize {
        self.pending.lock().tasks.len()
    }

    /// Number of individual operations waiting for a flush
    pub fn pending_operations(&self) -> usize {
        self.pending
            .lock()
            .tasks
            .values()
            .map(|t| t.operations.len())
            .sum()
    }

    /// Drain everything pending and dispatch one task per key to its world's
    /// writer, ascending by region volume. Returns the number of tasks dispatched.
    pub fn flush(&self) -> usize {
        let drained = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut pending.tasks)
        };
        if drained.is_empty() {
            return 0;
        }

        let mut batch: Vec<(WorldHandle, u64, MutationTask)> = drained
            .into_iter()
            .map(|((world_id, region), pending)| {
                (
                    pending.world,
                    pending.first_seen,
                    MutationTask::new(world_id, region, pending.operations),
                )
            })
            .collect();
        batch.sort_by_key(|(_, first_seen, task)| (task.volume(), *first_seen));

        let mut dispatched = 0;
        for (world, _, task) in batch {
            if world.is_closed() {
                warn!(world = %world.id(), "Dropping mutation task, world executor closed");
                task.fail(MutationError::World(WorldError::ExecutorClosed));
                continue;
            }
            // If the send races a shutdown the task is dropped and its
            // completions resolve as abandoned.
            if world.submit(move |w| task.execute(w)).is_ok() {
                dispatched += 1;
            }
        }

        debug!(dispatched, "Mutation flush");
        dispatched
    }
}
