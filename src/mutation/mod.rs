//! Deferred, batched world edits and searches
//!
//! Callers enqueue work against a `(world, region)` pair and get a
//! [`Completion`] back. Once per tick the engine drains everything pending,
//! merges operations that share a key into one [`task::MutationTask`], and
//! hands each task to the world's writer thread, smallest region first.

pub mod engine;
pub mod task;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::world::WorldError;

pub use engine::MutationEngine;

/// Mutation errors. Cloned onto every operation of a failed task.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error("Mutation action panicked: {0}")]
    ActionPanicked(String),

    #[error("Mutation was abandoned before it completed")]
    Abandoned,
}

/// Completion of a single queued operation
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, MutationError>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, MutationError>>) -> Self {
        Self { rx }
    }

    /// Non-blocking poll for use on the simulation thread
    pub fn try_take(&mut self) -> Option<Result<T, MutationError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(MutationError::Abandoned)),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, MutationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(MutationError::Abandoned)))
    }
}
