//! Match phases
//!
//! Exactly one [`MatchState`] is active at a time. Each phase implements
//! [`Phase`]; phases that share behaviour opt into the [`Idling`] or
//! [`Running`] capability traits and call the shared functions from there.

mod finalizing;
mod idling;
mod running;
mod starting;

pub use finalizing::Finalizing;
pub use idling::{Arena, Frozen, Idle, Idling, Skirmishing, Waiting};
pub use running::{Dueling, Playing, Running};
pub use starting::Starting;

use super::context::MatchEnv;
use super::hooks::{ActionResult, DamageOutcome, DamageSource, EntityRef, ItemStack};
use super::player::PlayerRecord;
use crate::world::{BlockPos, BlockState};

/// Per-phase contract. Every hook has a default; phases override what they need.
pub trait Phase: Send {
    fn name(&self) -> &'static str;

    /// Runs once when the phase becomes active, before any `update`
    fn on_setup(&mut self, _env: &mut MatchEnv) {}

    /// One simulation tick. `Some` replaces this phase.
    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState>;

    fn on_respawn(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord) {}

    /// Whether the death may proceed
    fn allow_death(&mut self, _env: &mut MatchEnv, _victim: &PlayerRecord, _source: &DamageSource) -> bool {
        true
    }

    fn on_take_damage(
        &mut self,
        _env: &mut MatchEnv,
        _victim: &PlayerRecord,
        _source: &DamageSource,
        amount: f32,
    ) -> DamageOutcome {
        DamageOutcome::Apply(amount)
    }

    fn allow_block_break(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _pos: BlockPos) -> bool {
        env.is_operator(player.id())
    }

    fn on_block_used(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::Pass
    }

    fn on_block_placed(
        &mut self,
        env: &mut MatchEnv,
        player: &PlayerRecord,
        _pos: BlockPos,
        _block: BlockState,
    ) -> bool {
        env.is_operator(player.id())
    }

    fn on_use_entity(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        ActionResult::Pass
    }

    fn on_attack_block(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::allow_if(env.is_operator(player.id()))
    }

    fn on_attack_entity(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        ActionResult::Pass
    }

    fn on_item_dropped(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        ActionResult::Pass
    }

    fn on_item_acquired(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        ActionResult::Pass
    }
}

/// The active phase
pub enum MatchState {
    Idle(Idle),
    Waiting(Waiting),
    Starting(Starting),
    Playing(Playing),
    Dueling(Dueling),
    Finalizing(Finalizing),
    Frozen(Frozen),
    Arena(Arena),
    Skirmishing(Skirmishing),
}

impl MatchState {
    pub fn phase(&self) -> &dyn Phase {
        match self {
            MatchState::Idle(s) => s,
            MatchState::Waiting(s) => s,
            MatchState::Starting(s) => s,
            MatchState::Playing(s) => s,
            MatchState::Dueling(s) => s,
            MatchState::Finalizing(s) => s,
            MatchState::Frozen(s) => s,
            MatchState::Arena(s) => s,
            MatchState::Skirmishing(s) => s,
        }
    }

    pub fn phase_mut(&mut self) -> &mut dyn Phase {
        match self {
            MatchState::Idle(s) => s,
            MatchState::Waiting(s) => s,
            MatchState::Starting(s) => s,
            MatchState::Playing(s) => s,
            MatchState::Dueling(s) => s,
            MatchState::Finalizing(s) => s,
            MatchState::Frozen(s) => s,
            MatchState::Arena(s) => s,
            MatchState::Skirmishing(s) => s,
        }
    }

    pub fn name(&self) -> &'static str {
        self.phase().name()
    }

    /// Competitive phase with death bookkeeping
    pub fn is_running(&self) -> bool {
        matches!(self, MatchState::Playing(_) | MatchState::Dueling(_))
    }

    /// Non-competitive phase where damage is absorbed
    pub fn is_idling(&self) -> bool {
        matches!(
            self,
            MatchState::Idle(_)
                | MatchState::Waiting(_)
                | MatchState::Frozen(_)
                | MatchState::Arena(_)
                | MatchState::Skirmishing(_)
        )
    }

    pub(crate) fn on_setup(&mut self, env: &mut MatchEnv) {
        self.phase_mut().on_setup(env)
    }

    pub(crate) fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        self.phase_mut().update(env)
    }

    /// Parse a phase name as used by operator tooling
    pub fn from_name(name: &str, env: &MatchEnv) -> Option<MatchState> {
        let settings = &env.settings;
        let state = match name.to_ascii_lowercase().as_str() {
            "idle" => MatchState::Idle(Idle),
            "waiting" => MatchState::Waiting(Waiting),
            "starting" => MatchState::Starting(Starting::teams(settings.start_countdown_ticks)),
            "starting_duel" => MatchState::Starting(Starting::duel(settings.start_countdown_ticks)),
            "playing" => MatchState::Playing(Playing),
            "dueling" => MatchState::Dueling(Dueling),
            "finalizing" => MatchState::Finalizing(Finalizing::new(settings.finalize_ticks)),
            "frozen" => MatchState::Frozen(Frozen::new()),
            "arena" => MatchState::Arena(Arena),
            "skirmishing" => MatchState::Skirmishing(Skirmishing),
            _ => return None,
        };
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::context_with;

    #[test]
    fn families_are_disjoint() {
        let all = [
            MatchState::Idle(Idle),
            MatchState::Waiting(Waiting),
            MatchState::Starting(Starting::teams(1)),
            MatchState::Playing(Playing),
            MatchState::Dueling(Dueling),
            MatchState::Finalizing(Finalizing::new(1)),
            MatchState::Frozen(Frozen::new()),
            MatchState::Arena(Arena),
            MatchState::Skirmishing(Skirmishing),
        ];
        for state in &all {
            assert!(!(state.is_running() && state.is_idling()), "{}", state.name());
        }
        assert_eq!(all.iter().filter(|s| s.is_running()).count(), 2);
        assert_eq!(all.iter().filter(|s| s.is_idling()).count(), 5);
    }

    #[test]
    fn from_name_covers_every_phase() {
        let (ctx, _director) = context_with(MatchState::Idle(Idle));
        for name in [
            "idle",
            "waiting",
            "starting",
            "playing",
            "dueling",
            "finalizing",
            "frozen",
            "arena",
            "skirmishing",
        ] {
            let state = MatchState::from_name(name, ctx.env()).unwrap();
            assert_eq!(state.name(), name);
        }
        assert_eq!(
            MatchState::from_name("starting_duel", ctx.env()).map(|s| s.name()),
            Some("starting")
        );
        assert!(MatchState::from_name("lunch", ctx.env()).is_none());
    }
}
