//! Cooperative timer scheduler bound to the simulation tick
//!
//! Callbacks are queued by absolute fire time on a monotonic clock and run by
//! [`Scheduler::update`] on the simulation thread. Nothing here spawns
//! threads; a task that is due simply runs during the next dispatch.
//!
//! Ordering is `(fire_time, insertion_sequence)`, so tasks sharing a fire time
//! run first-in first-out. Periodic tasks are re-armed at
//! `previous_fire_time + period` before their callback runs, which keeps
//! execution latency from accumulating but lets an overrun fire back-to-back
//! within one dispatch.

use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, ThreadId};
use tracing::{debug, error, info};

use crate::util::time::{Clock, MonotonicClock, NANOS_PER_SEC};
use crate::world::panic_message;

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler has not been started")]
    NotStarted,

    #[error("Scheduler has been stopped")]
    Stopped,

    #[error("Invalid duration: {0} seconds")]
    InvalidDuration(f64),

    #[error("Scheduler dispatch called off the simulation thread")]
    WrongThread,
}

type Callback = Box<dyn FnMut() + Send + 'static>;

/// Identifier of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct ScheduledTask {
    id: TaskId,
    fire_at: u64,
    seq: u64,
    period: Option<u64>,
    callback: Arc<Mutex<Callback>>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

struct Queue {
    heap: BinaryHeap<Reverse<ScheduledTask>>,
    lifecycle: Lifecycle,
    next_seq: u64,
    next_id: u64,
}

impl Queue {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn ensure_running(&self) -> Result<(), SchedulerError> {
        match self.lifecycle {
            Lifecycle::Idle => Err(SchedulerError::NotStarted),
            Lifecycle::Running => Ok(()),
            Lifecycle::Stopped => Err(SchedulerError::Stopped),
        }
    }
}

/// Handle returned for every scheduled task
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    queue: Weak<Mutex<Queue>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Remove the task before it fires.
    ///
    /// Returns false if it already fired (one-shot), was already cancelled,
    /// or the scheduler is stopped.
    pub fn cancel(&self) -> bool {
        let Some(queue) = self.queue.upgrade() else {
            return false;
        };
        let mut queue = queue.lock();
        if queue.lifecycle != Lifecycle::Running {
            return false;
        }
        let before = queue.heap.len();
        queue.heap.retain(|Reverse(task)| task.id != self.id);
        before != queue.heap.len()
    }
}

/// Monotonic-clock priority-queue timer
#[derive(Clone)]
pub struct Scheduler {
    queue: Arc<Mutex<Queue>>,
    clock: Arc<dyn Clock>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(Queue {
                heap: BinaryHeap::new(),
                lifecycle: Lifecycle::Idle,
                next_seq: 0,
                next_id: 0,
            })),
            clock,
            owner: Arc::new(OnceLock::new()),
        }
    }

    /// Accept work. A stopped scheduler cannot be restarted.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut queue = self.queue.lock();
        match queue.lifecycle {
            Lifecycle::Stopped => Err(SchedulerError::Stopped),
            _ => {
                queue.lifecycle = Lifecycle::Running;
                Ok(())
            }
        }
    }

    /// Refuse further work and discard everything pending
    pub fn stop(&self) {
        let mut queue = self.queue.lock();
        let discarded = queue.heap.len();
        queue.lifecycle = Lifecycle::Stopped;
        queue.heap.clear();
        info!(discarded, "Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.queue.lock().lifecycle == Lifecycle::Running
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.queue.lock().heap.len()
    }

    /// Fire time of the earliest queued task, in clock nanoseconds
    pub fn next_fire_nanos(&self) -> Option<u64> {
        self.queue.lock().heap.peek().map(|Reverse(task)| task.fire_at)
    }

    /// Pin dispatch to the calling thread. Otherwise the first `update` call pins it.
    pub fn bind_to_current_thread(&self) -> Result<(), SchedulerError> {
        let current = thread::current().id();
        let owner = *self.owner.get_or_init(|| current);
        if owner == current {
            Ok(())
        } else {
            Err(SchedulerError::WrongThread)
        }
    }

    /// Run on the next dispatch
    pub fn now<F>(&self, callback: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(0, None, Box::new(callback))
    }

    /// Run once after `seconds`
    pub fn delay<F>(&self, seconds: f64, callback: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        let nanos = to_nanos(seconds)?;
        self.schedule(nanos, None, Box::new(callback))
    }

    /// Run every `seconds`, first after one period
    pub fn interval<F>(&self, seconds: f64, callback: F) -> Result<TaskHandle, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        let nanos = to_nanos(seconds)?;
        if nanos == 0 {
            return Err(SchedulerError::InvalidDuration(seconds));
        }
        self.schedule(nanos, Some(nanos), Box::new(callback))
    }

    fn schedule(
        &self,
        after: u64,
        period: Option<u64>,
        callback: Callback,
    ) -> Result<TaskHandle, SchedulerError> {
        let mut queue = self.queue.lock();
        queue.ensure_running()?;

        queue.next_id += 1;
        let id = TaskId(queue.next_id);
        let seq = queue.next_seq();
        let fire_at = self.clock.now_nanos().saturating_add(after);
        queue.heap.push(Reverse(ScheduledTask {
            id,
            fire_at,
            seq,
            period,
            callback: Arc::new(Mutex::new(callback)),
        }));

        Ok(TaskHandle {
            id,
            queue: Arc::downgrade(&self.queue),
        })
    }

    /// Run every task that is due. Returns how many callbacks ran.
    pub fn update(&self) -> Result<usize, SchedulerError> {
        self.bind_to_current_thread()?;
        self.queue.lock().ensure_running()?;

        let now = self.clock.now_nanos();
        let mut fired = 0;

        loop {
            let (id, callback) = {
                let mut queue = self.queue.lock();
                if queue.lifecycle != Lifecycle::Running {
                    break;
                }
                match queue.heap.peek() {
                    Some(Reverse(task)) if task.fire_at <= now => {}
                    _ => break,
                }
                let Some(Reverse(task)) = queue.heap.pop() else {
                    break;
                };
                if let Some(period) = task.period {
                    let seq = queue.next_seq();
                    queue.heap.push(Reverse(ScheduledTask {
                        id: task.id,
                        fire_at: task.fire_at.saturating_add(period),
                        seq,
                        period: task.period,
                        callback: task.callback.clone(),
                    }));
                }
                (task.id, task.callback)
            };

            let result = catch_unwind(AssertUnwindSafe(|| {
                let mut callback = callback.lock();
                (*callback)();
            }));
            if let Err(panic) = result {
                error!(
                    task_id = id.0,
                    cause = %panic_message(panic.as_ref()),
                    "Scheduled task panicked"
                );
            }
            fired += 1;
        }

        if fired > 0 {
            debug!(fired, "Scheduler dispatch");
        }
        Ok(fired)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn to_nanos(seconds: f64) -> Result<u64, SchedulerError> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SchedulerError::InvalidDuration(seconds));
    }
    Ok((seconds * NANOS_PER_SEC as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::ManualClock;

    fn scheduler() -> (Scheduler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let scheduler = Scheduler::with_clock(clock.clone());
        scheduler.start().unwrap();
        (scheduler, clock)
    }

    fn recorder() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn delays_fire_once_in_time_order() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        for (tag, secs) in [(0u32, 0.3), (1, 0.1), (2, 0.2), (3, 0.25)] {
            let log = log.clone();
            scheduler.delay(secs, move || log.lock().push(tag)).unwrap();
        }

        clock.advance_millis(150);
        assert_eq!(scheduler.update().unwrap(), 1);
        clock.advance_millis(1000);
        assert_eq!(scheduler.update().unwrap(), 3);
        assert_eq!(scheduler.update().unwrap(), 0);

        assert_eq!(*log.lock(), vec![1, 2, 3, 0]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn nothing_fires_before_its_time() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let l = log.clone();
        scheduler.delay(1.0, move || l.lock().push(1)).unwrap();
        clock.advance_millis(999);
        assert_eq!(scheduler.update().unwrap(), 0);
        clock.advance_millis(1);
        assert_eq!(scheduler.update().unwrap(), 1);
    }

    #[test]
    fn equal_fire_times_run_in_insertion_order() {
        let (scheduler, _clock) = scheduler();
        let log = recorder();
        for tag in 0..5 {
            let log = log.clone();
            scheduler.now(move || log.lock().push(tag)).unwrap();
        }
        scheduler.update().unwrap();
        assert_eq!(*log.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn cancel_before_fire_prevents_it() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let l = log.clone();
        let handle = scheduler.delay(0.5, move || l.lock().push(1)).unwrap();
        assert!(handle.cancel());
        assert!(!handle.cancel());
        clock.advance_millis(1000);
        scheduler.update().unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn cancel_after_fire_returns_false() {
        let (scheduler, clock) = scheduler();
        let handle = scheduler.delay(0.1, || {}).unwrap();
        clock.advance_millis(200);
        assert_eq!(scheduler.update().unwrap(), 1);
        assert!(!handle.cancel());
    }

    #[test]
    fn interval_rearms_from_previous_fire_time() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let l = log.clone();
        scheduler.interval(1.0, move || l.lock().push(1)).unwrap();

        // Dispatch runs late: first fire at t=1.3 for a task due at 1.0
        clock.advance_millis(1300);
        assert_eq!(scheduler.update().unwrap(), 1);
        assert_eq!(scheduler.next_fire_nanos(), Some(2 * NANOS_PER_SEC));

        clock.advance_millis(700);
        assert_eq!(scheduler.update().unwrap(), 1);
        assert_eq!(scheduler.next_fire_nanos(), Some(3 * NANOS_PER_SEC));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn interval_catches_up_after_overrun() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let l = log.clone();
        scheduler.interval(1.0, move || l.lock().push(1)).unwrap();
        clock.advance_millis(3500);
        assert_eq!(scheduler.update().unwrap(), 3);
        assert_eq!(scheduler.next_fire_nanos(), Some(4 * NANOS_PER_SEC));
    }

    #[test]
    fn interval_can_cancel_itself() {
        let (scheduler, clock) = scheduler();
        let slot: Arc<Mutex<Option<TaskHandle>>> = Arc::new(Mutex::new(None));
        let count = recorder();
        let (s, c) = (slot.clone(), count.clone());
        let handle = scheduler
            .interval(1.0, move || {
                c.lock().push(1);
                if let Some(handle) = s.lock().as_ref() {
                    assert!(handle.cancel());
                }
            })
            .unwrap();
        *slot.lock() = Some(handle);

        clock.advance_millis(5000);
        assert_eq!(scheduler.update().unwrap(), 1);
        assert_eq!(count.lock().len(), 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn panicking_callback_does_not_abort_batch() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let (a, b) = (log.clone(), log.clone());
        scheduler.delay(0.1, move || a.lock().push(1)).unwrap();
        scheduler.delay(0.2, || panic!("callback failure")).unwrap();
        scheduler.delay(0.3, move || b.lock().push(3)).unwrap();
        clock.advance_millis(1000);
        assert_eq!(scheduler.update().unwrap(), 3);
        assert_eq!(*log.lock(), vec![1, 3]);
    }

    #[test]
    fn callbacks_may_schedule_more_work() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let (inner_scheduler, l) = (scheduler.clone(), log.clone());
        scheduler
            .now(move || {
                let l = l.clone();
                inner_scheduler.delay(1.0, move || l.lock().push(2)).unwrap();
            })
            .unwrap();
        scheduler.update().unwrap();
        assert_eq!(scheduler.pending(), 1);
        clock.advance_millis(1000);
        scheduler.update().unwrap();
        assert_eq!(*log.lock(), vec![2]);
    }

    #[test]
    fn invalid_durations_are_rejected() {
        let (scheduler, _clock) = scheduler();
        assert!(matches!(
            scheduler.delay(-1.0, || {}),
            Err(SchedulerError::InvalidDuration(_))
        ));
        assert!(scheduler.delay(f64::NAN, || {}).is_err());
        assert!(scheduler.interval(f64::INFINITY, || {}).is_err());
        assert!(scheduler.interval(0.0, || {}).is_err());
        assert!(scheduler.delay(0.0, || {}).is_ok());
    }

    #[test]
    fn unusable_before_start() {
        let scheduler = Scheduler::with_clock(Arc::new(ManualClock::new()));
        assert_eq!(scheduler.now(|| {}).err(), Some(SchedulerError::NotStarted));
        assert_eq!(scheduler.update(), Err(SchedulerError::NotStarted));
    }

    #[test]
    fn stop_discards_pending_and_rejects_new_work() {
        let (scheduler, clock) = scheduler();
        let log = recorder();
        let l = log.clone();
        let handle = scheduler.delay(0.1, move || l.lock().push(1)).unwrap();
        scheduler.stop();

        assert_eq!(scheduler.pending(), 0);
        assert!(!handle.cancel());
        assert_eq!(scheduler.now(|| {}).err(), Some(SchedulerError::Stopped));
        assert_eq!(scheduler.start(), Err(SchedulerError::Stopped));
        clock.advance_millis(1000);
        assert_eq!(scheduler.update(), Err(SchedulerError::Stopped));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn dispatch_is_pinned_to_one_thread() {
        let (scheduler, _clock) = scheduler();
        scheduler.update().unwrap();
        let other = scheduler.clone();
        let result = std::thread::spawn(move || other.update()).join().unwrap();
        assert_eq!(result, Err(SchedulerError::WrongThread));
    }
}
