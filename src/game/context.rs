//! Match context: shared services plus the single active state

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::director::MatchDirector;
use super::hooks::{ActionResult, DamageOutcome, DamageSource, HookChain, Intent, Verdict};
use super::player::{PlayerRecord, PlayerRegistry};
use super::state::MatchState;
use super::team::{Side, Team};
use crate::config::Config;
use crate::mutation::MutationEngine;
use crate::scheduler::Scheduler;
use crate::world::{BlockPos, Region, Vec3, WorldHandle};
use crate::ws::protocol::Announcement;

/// Tunables for the match rules
#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub tick_rate: u32,
    /// Where competitive play is legal
    pub legal_region: Region,
    pub lobby_spawn: Vec3,
    pub freeze_tolerance: f64,
    pub finalize_ticks: u32,
    pub start_countdown_ticks: u32,
    /// 0 disables auto-start
    pub auto_start_players: usize,
    pub seed: u64,
}

impl MatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tick_rate: config.tick_rate,
            legal_region: config.arena_region,
            lobby_spawn: config.lobby_spawn,
            freeze_tolerance: config.freeze_tolerance,
            finalize_ticks: config.finalize_ticks,
            start_countdown_ticks: config.start_countdown_ticks,
            auto_start_players: config.auto_start_players,
            seed: config.world_seed,
        }
    }
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            tick_rate: crate::util::time::DEFAULT_TPS,
            legal_region: Region::new(BlockPos::new(-32, 0, -32), BlockPos::new(32, 64, 32)),
            lobby_spawn: Vec3::new(0.5, 65.0, 0.5),
            freeze_tolerance: 0.5,
            finalize_ticks: 100,
            start_countdown_ticks: 100,
            auto_start_players: 0,
            seed: 0,
        }
    }
}

/// Identities with the operator capability
#[derive(Debug, Clone, Default)]
pub struct PrivilegeCatalog {
    operators: HashSet<Uuid>,
}

impl PrivilegeCatalog {
    pub fn new(operators: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.operators.contains(id)
    }

    pub fn grant(&mut self, id: Uuid) {
        self.operators.insert(id);
    }

    pub fn revoke(&mut self, id: &Uuid) {
        self.operators.remove(id);
    }
}

/// Services every state may use. Touched only from the simulation thread,
/// apart from the registry which carries its own lock.
pub struct MatchEnv {
    pub world: WorldHandle,
    pub players: Arc<PlayerRegistry>,
    pub privileges: PrivilegeCatalog,
    pub director: Arc<dyn MatchDirector>,
    pub scheduler: Scheduler,
    pub mutations: Arc<MutationEngine>,
    pub settings: MatchSettings,
    pub rng: ChaCha8Rng,
    tick: u64,
}

impl MatchEnv {
    pub fn new(
        world: WorldHandle,
        players: Arc<PlayerRegistry>,
        director: Arc<dyn MatchDirector>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            world,
            players,
            privileges: PrivilegeCatalog::default(),
            director,
            scheduler: Scheduler::new(),
            mutations: Arc::new(MutationEngine::new()),
            rng: ChaCha8Rng::seed_from_u64(settings.seed),
            settings,
            tick: 0,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Catalog entry or operator team
    pub fn is_operator(&self, id: Uuid) -> bool {
        self.privileges.contains(&id)
            || self
                .players
                .get(&id)
                .is_some_and(|p| p.team().is_operator())
    }

    /// Alive competitive participant
    pub fn is_active_participant(&self, player: &PlayerRecord) -> bool {
        player.team().is_playing() && player.is_alive()
    }

    pub fn assign_team(&self, id: Uuid, team: Team) -> bool {
        match self.players.get(&id) {
            Some(player) => {
                info!(player_id = %id, team = team.display_name(), "Team assigned");
                player.set_team(team);
                true
            }
            None => false,
        }
    }

    /// Alive records on a side
    pub fn alive_on(&self, side: Side) -> usize {
        self.players
            .all()
            .iter()
            .filter(|p| p.is_alive() && p.team().side() == Some(side))
            .count()
    }
}

/// Owns the services and the one active [`MatchState`]
pub struct MatchContext {
    env: MatchEnv,
    state: MatchState,
    chain: HookChain,
    transitions: u64,
}

impl MatchContext {
    /// Activate `initial` (running its setup) and build the context
    pub fn new(mut env: MatchEnv, mut initial: MatchState) -> Self {
        initial.on_setup(&mut env);
        info!(state = initial.name(), "Match context created");
        Self {
            env,
            state: initial,
            chain: HookChain::new(),
            transitions: 0,
        }
    }

    pub fn env(&self) -> &MatchEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut MatchEnv {
        &mut self.env
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    pub fn phase_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Register an extension handler consulted before the active state
    pub fn add_handler<F>(&mut self, name: &'static str, handler: F)
    where
        F: FnMut(&MatchEnv, &Intent) -> ActionResult + Send + 'static,
    {
        self.chain.push(name, handler);
    }

    /// Advance the active state by one tick, installing its successor if any
    pub fn update(&mut self) {
        self.env.tick += 1;
        if let Some(next) = self.state.update(&mut self.env) {
            self.install(next);
        }
    }

    /// Replace the active state from outside the update cycle
    pub fn transition_to(&mut self, next: MatchState) {
        self.install(next);
    }

    fn install(&mut self, mut next: MatchState) {
        // Setup runs while the old state is still current
        next.on_setup(&mut self.env);
        let from = self.state.name();
        let to = next.name();
        self.state = next;
        self.transitions += 1;
        info!(from, to, tick = self.env.tick, "Match state changed");
        self.env.director.announce(Announcement::PhaseChanged {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Route a raw intent through the handler chain, then the active state
    pub fn dispatch(&mut self, intent: &Intent) -> Verdict {
        match self.chain.evaluate(&self.env, intent) {
            ActionResult::Pass => {}
            decided => return decided.into(),
        }

        let Some(actor) = self.env.players.get(&intent.actor()) else {
            debug!(player_id = %intent.actor(), intent = intent.name(), "Intent from untracked player");
            return match intent {
                Intent::Respawn { .. } | Intent::Death { .. } | Intent::Damage { .. } => Verdict::Allow,
                _ => Verdict::Deny,
            };
        };

        let env = &mut self.env;
        let phase = self.state.phase_mut();
        match intent {
            Intent::Respawn { .. } => {
                phase.on_respawn(env, &actor);
                Verdict::Allow
            }
            Intent::Death { source, .. } => Verdict::from_allowed(phase.allow_death(env, &actor, source)),
            Intent::Damage { source, amount, .. } => {
                phase.on_take_damage(env, &actor, source, *amount).into()
            }
            Intent::BlockBreak { pos, .. } => {
                Verdict::from_allowed(phase.allow_block_break(env, &actor, *pos))
            }
            Intent::BlockUse { pos, .. } => phase.on_block_used(env, &actor, *pos).into(),
            Intent::BlockPlace { pos, block, .. } => {
                Verdict::from_allowed(phase.on_block_placed(env, &actor, *pos, *block))
            }
            Intent::UseEntity { target, .. } => phase.on_use_entity(env, &actor, target).into(),
            Intent::AttackBlock { pos, .. } => phase.on_attack_block(env, &actor, *pos).into(),
            Intent::AttackEntity { target, .. } => phase.on_attack_entity(env, &actor, target).into(),
            Intent::ItemDropped { item, .. } => phase.on_item_dropped(env, &actor, item).into(),
            Intent::ItemAcquired { item, .. } => phase.on_item_acquired(env, &actor, item).into(),
        }
    }

    /// Death hook of the active state. Untracked victims are always allowed.
    pub fn allow_death(&mut self, victim: Uuid, source: DamageSource) -> bool {
        self.dispatch(&Intent::Death { victim, source }).is_allowed()
    }

    /// Damage hook of the active state, without the verdict collapse
    pub fn on_take_damage(&mut self, victim: Uuid, source: DamageSource, amount: f32) -> DamageOutcome {
        match self.env.players.get(&victim) {
            Some(record) => self
                .state
                .phase_mut()
                .on_take_damage(&mut self.env, &record, &source, amount),
            None => DamageOutcome::Apply(amount),
        }
    }
}
