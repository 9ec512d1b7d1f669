//! Pre-round countdown

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::{Dueling, MatchState, Phase, Playing};
use crate::game::context::MatchEnv;
use crate::mutation::Completion;
use crate::world::{BlockPos, BlockState, Vec3};
use crate::ws::protocol::{Announcement, RoundKind};

/// Revives participants, looks for spawn markers in the legal region while
/// counting down, then drops everyone onto a marker and starts the round.
pub struct Starting {
    kind: RoundKind,
    ticks: u32,
    elapsed: u32,
    markers: Vec<BlockPos>,
    search: Option<Completion<Vec<BlockPos>>>,
}

impl Starting {
    pub fn new(kind: RoundKind, ticks: u32) -> Self {
        Self {
            kind,
            ticks,
            elapsed: 0,
            markers: Vec::new(),
            search: None,
        }
    }

    pub fn teams(ticks: u32) -> Self {
        Self::new(RoundKind::Teams, ticks)
    }

    pub fn duel(ticks: u32) -> Self {
        Self::new(RoundKind::Duel, ticks)
    }

    pub fn kind(&self) -> RoundKind {
        self.kind
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.ticks.saturating_sub(self.elapsed)
    }

    pub fn markers(&self) -> &[BlockPos] {
        &self.markers
    }

    fn poll_markers(&mut self) {
        let Some(search) = self.search.as_mut() else {
            return;
        };
        match search.try_take() {
            Some(Ok(found)) => {
                debug!(markers = found.len(), "Spawn marker search finished");
                self.markers = found;
                self.search = None;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Spawn marker search failed, using region centre");
                self.search = None;
            }
            None => {}
        }
    }

    fn spawn_point(&self, env: &mut MatchEnv) -> Vec3 {
        match self.markers.choose(&mut env.rng) {
            Some(marker) => Vec3::new(
                marker.x as f64 + 0.5,
                marker.y as f64 + 1.0,
                marker.z as f64 + 0.5,
            ),
            None => env.settings.legal_region.center(),
        }
    }

    fn deploy(&self, env: &mut MatchEnv) {
        for (player, session) in env.players.connected() {
            if !player.team().is_playing() {
                continue;
            }
            let spawn = self.spawn_point(env);
            session.teleport(spawn);
            debug!(player_id = %player.id(), x = spawn.x, y = spawn.y, z = spawn.z, "Deployed");
        }
    }
}

impl Phase for Starting {
    fn name(&self) -> &'static str {
        "starting"
    }

    fn on_setup(&mut self, env: &mut MatchEnv) {
        let mut revived = 0;
        for player in env.players.all() {
            if !player.team().is_playing() {
                continue;
            }
            player.set_alive(true);
            if let Some(session) = player.session() {
                session.restore_vitals();
            }
            revived += 1;
        }

        let region = env.settings.legal_region;
        self.search = Some(env.mutations.search(&env.world, region, |_, block| {
            block == BlockState::SPAWN_MARKER
        }));

        let seconds = self.ticks.div_ceil(env.settings.tick_rate.max(1));
        info!(kind = ?self.kind, revived, seconds, "Round starting");
        env.director.announce(Announcement::RoundStarting {
            kind: self.kind,
            seconds,
        });
    }

    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        self.poll_markers();
        self.elapsed += 1;

        if self.elapsed < self.ticks {
            let remaining = self.ticks - self.elapsed;
            let rate = env.settings.tick_rate.max(1);
            if remaining % rate == 0 {
                env.director.announce(Announcement::Countdown {
                    seconds: remaining / rate,
                });
            }
            return None;
        }

        self.deploy(env);
        env.director
            .announce(Announcement::RoundStarted { kind: self.kind });
        Some(match self.kind {
            RoundKind::Teams => MatchState::Playing(Playing),
            RoundKind::Duel => MatchState::Dueling(Dueling),
        })
    }
}
