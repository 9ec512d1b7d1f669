//! Single-writer execution context for a world
//!
//! A [`ChunkedWorld`] is moved onto its own OS thread. Everything that reads
//! or mutates it is submitted as a job through a [`WorldHandle`] and runs
//! there, one job at a time, in submission order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::store::{ChunkedWorld, WorldError, WorldId, WorldLayout};

/// Work unit executed against the authoritative world
pub type WorldJob = Box<dyn FnOnce(&mut ChunkedWorld) + Send + 'static>;

/// Cloneable handle to a world's writer thread
#[derive(Clone)]
pub struct WorldHandle {
    id: WorldId,
    layout: WorldLayout,
    job_tx: mpsc::UnboundedSender<WorldJob>,
}

impl WorldHandle {
    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn layout(&self) -> WorldLayout {
        self.layout
    }

    /// Queue a job on the writer. Returns immediately.
    pub fn submit<F>(&self, job: F) -> Result<(), WorldError>
    where
        F: FnOnce(&mut ChunkedWorld) + Send + 'static,
    {
        self.job_tx
            .send(Box::new(job))
            .map_err(|_| WorldError::ExecutorClosed)
    }

    /// Run a closure on the writer and receive its result
    pub fn query<T, F>(&self, f: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ChunkedWorld) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let submitted = self.submit(move |world| {
            let _ = tx.send(f(world));
        });
        if submitted.is_err() {
            debug!(world = %self.id, "Query dropped, executor closed");
        }
        rx
    }

    pub fn is_closed(&self) -> bool {
        self.job_tx.is_closed()
    }
}

/// Spawns writer threads
pub struct WorldExecutor;

impl WorldExecutor {
    /// Move `world` onto a dedicated thread and hand back its handle.
    /// The thread exits once every handle has been dropped.
    pub fn spawn(mut world: ChunkedWorld) -> std::io::Result<WorldHandle> {
        let id = world.id();
        let layout = world.layout();
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<WorldJob>();

        thread::Builder::new()
            .name(format!("world-{}", &id.to_string()[..8]))
            .spawn(move || {
                info!(world = %id, "World writer started");
                while let Some(job) = job_rx.blocking_recv() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| job(&mut world))) {
                        error!(
                            world = %id,
                            cause = %panic_message(panic.as_ref()),
                            "World job panicked"
                        );
                    }
                }
                info!(world = %id, "World writer stopped");
            })?;

        Ok(WorldHandle { id, layout, job_tx })
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
