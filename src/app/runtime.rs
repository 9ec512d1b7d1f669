//! Simulation thread: the authoritative tick loop

use serde::Serialize;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tracing::{debug, error, info};

use crate::game::MatchContext;
use crate::scheduler::{SchedulerError, TaskHandle};
use crate::session::IntentEnvelope;

/// Seconds between heartbeat log lines
pub const HEARTBEAT_SECS: f64 = 30.0;

/// Snapshot published after every tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeStatus {
    pub tick: u64,
    pub phase: &'static str,
    pub scheduled_tasks: usize,
    pub pending_mutations: usize,
    pub players: usize,
    pub connected: usize,
}

/// Owns the match context and drives it one tick at a time
pub struct MatchRuntime {
    context: MatchContext,
    intents: mpsc::Receiver<IntentEnvelope>,
    status_tx: watch::Sender<RuntimeStatus>,
    heartbeat: Option<TaskHandle>,
}

impl MatchRuntime {
    pub fn new(
        context: MatchContext,
        intents: mpsc::Receiver<IntentEnvelope>,
    ) -> (Self, watch::Receiver<RuntimeStatus>) {
        let (status_tx, status_rx) = watch::channel(RuntimeStatus {
            phase: context.phase_name(),
            ..RuntimeStatus::default()
        });
        let runtime = Self {
            context,
            intents,
            status_tx,
            heartbeat: None,
        };
        (runtime, status_rx)
    }

    pub fn context(&self) -> &MatchContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut MatchContext {
        &mut self.context
    }

    /// Claim the calling thread for the scheduler and register the heartbeat
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        let scheduler = &self.context.env().scheduler;
        scheduler.bind_to_current_thread()?;
        scheduler.start()?;

        let status = self.status_tx.subscribe();
        let heartbeat = scheduler.interval(HEARTBEAT_SECS, move || {
            let s = status.borrow();
            info!(
                tick = s.tick,
                phase = s.phase,
                scheduled = s.scheduled_tasks,
                pending_mutations = s.pending_mutations,
                players = s.players,
                connected = s.connected,
                "Runtime heartbeat"
            );
        })?;
        self.heartbeat = Some(heartbeat);
        info!(phase = self.context.phase_name(), "Match runtime started");
        Ok(())
    }

    /// One simulation tick: intents, due timers, mutation flush, phase
    /// update, presentation sync
    pub fn tick(&mut self) -> Result<(), SchedulerError> {
        let decided = self.drain_intents();
        let fired = self.context.env().scheduler.update()?;
        let flushed = self.context.env().mutations.flush();
        self.context.update();
        let presented = self.context.env().players.sync_presentation();

        if decided + fired + flushed + presented > 0 {
            debug!(
                tick = self.context.env().tick(),
                decided, fired, flushed, presented, "Tick"
            );
        }
        self.publish();
        Ok(())
    }

    fn drain_intents(&mut self) -> usize {
        let mut decided = 0;
        while let Ok(envelope) = self.intents.try_recv() {
            let verdict = self.context.dispatch(&envelope.intent);
            // The requester may have given up waiting
            let _ = envelope.reply.send(verdict);
            decided += 1;
        }
        decided
    }

    fn publish(&self) {
        let env = self.context.env();
        let status = RuntimeStatus {
            tick: env.tick(),
            phase: self.context.phase_name(),
            scheduled_tasks: env.scheduler.pending(),
            pending_mutations: env.mutations.pending_operations(),
            players: env.players.len(),
            connected: env.players.connected().len(),
        };
        self.status_tx.send_replace(status);
    }

    /// Stop timers and push out whatever mutations are still queued
    pub fn stop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.cancel();
        }
        let env = self.context.env();
        env.scheduler.stop();
        let flushed = env.mutations.flush();
        info!(tick = env.tick(), flushed, "Match runtime stopped");
    }

    /// Tick at a fixed rate until `shutdown` flips to true
    pub async fn run(mut self, tick_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.start() {
            error!(error = %e, "Match runtime failed to start");
            return;
        }

        let mut ticker = interval(tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        error!(error = %e, "Tick failed, stopping match runtime");
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.stop();
    }

    /// Run on a dedicated OS thread with its own single-threaded runtime.
    /// Everything the scheduler dispatches runs on this thread.
    pub fn spawn(
        self,
        tick_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("match-sim".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "Failed to build simulation runtime");
                        return;
                    }
                };
                rt.block_on(self.run(tick_interval, shutdown));
            })
    }
}
