//! Non-competitive phases: damage never kills, players idle in the lobby

use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{MatchState, Phase, Starting};
use crate::game::context::MatchEnv;
use crate::game::hooks::{ActionResult, DamageOutcome, DamageSource, EntityRef, ItemStack};
use crate::game::player::PlayerRecord;
use crate::game::team::Side;
use crate::world::{BlockPos, BlockState, Vec3};

/// Behaviour shared by every idling phase
pub trait Idling: Phase {
    /// Back to the lobby with full vitals
    fn send_to_lobby(&self, env: &MatchEnv, player: &PlayerRecord) {
        if let Some(session) = player.session() {
            session.teleport(env.settings.lobby_spawn);
            session.restore_vitals();
        }
    }

    fn absorb(&self) -> DamageOutcome {
        DamageOutcome::Absorb
    }

    fn operator_only(&self, env: &MatchEnv, player: &PlayerRecord) -> ActionResult {
        ActionResult::allow_if(env.is_operator(player.id()))
    }
}

/// Plain idling, nothing happens
pub struct Idle;

impl Idling for Idle {}

impl Phase for Idle {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn update(&mut self, _env: &mut MatchEnv) -> Option<MatchState> {
        None
    }

    fn on_respawn(&mut self, env: &mut MatchEnv, player: &PlayerRecord) {
        self.send_to_lobby(env, player);
    }

    fn on_take_damage(&mut self, _env: &mut MatchEnv, _: &PlayerRecord, _: &DamageSource, _: f32) -> DamageOutcome {
        self.absorb()
    }

    fn on_attack_block(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::Pass
    }

    fn on_item_dropped(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_acquired(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }
}

/// Lobby between rounds. Keeps everyone topped up and optionally starts the
/// next team round once both sides have enough players.
pub struct Waiting;

impl Waiting {
    fn ready_on(env: &MatchEnv, side: Side) -> usize {
        env.players
            .connected()
            .iter()
            .filter(|(player, _)| player.team().side() == Some(side))
            .count()
    }
}

impl Idling for Waiting {}

impl Phase for Waiting {
    fn name(&self) -> &'static str {
        "waiting"
    }

    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        for (_, session) in env.players.connected() {
            session.restore_vitals();
        }

        let needed = env.settings.auto_start_players;
        if needed == 0 {
            return None;
        }
        let yellow = Self::ready_on(env, Side::Yellow);
        let blue = Self::ready_on(env, Side::Blue);
        if yellow >= needed && blue >= needed {
            info!(yellow, blue, "Enough players, starting team round");
            return Some(MatchState::Starting(Starting::teams(
                env.settings.start_countdown_ticks,
            )));
        }
        None
    }

    fn on_respawn(&mut self, env: &mut MatchEnv, player: &PlayerRecord) {
        self.send_to_lobby(env, player);
    }

    fn on_take_damage(&mut self, _env: &mut MatchEnv, _: &PlayerRecord, _: &DamageSource, _: f32) -> DamageOutcome {
        self.absorb()
    }

    fn on_attack_block(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::Pass
    }

    fn on_item_dropped(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_acquired(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }
}

#[derive(Debug, Clone, Copy)]
struct FrozenSnapshot {
    position: Vec3,
    health: f32,
}

/// Pause. Everyone is held at the position and health they had when first
/// seen in this phase; only operators may interact with anything.
#[derive(Default)]
pub struct Frozen {
    snapshots: HashMap<Uuid, FrozenSnapshot>,
}

impl Frozen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frozen_players(&self) -> usize {
        self.snapshots.len()
    }
}

impl Idling for Frozen {}

impl Phase for Frozen {
    fn name(&self) -> &'static str {
        "frozen"
    }

    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        let tolerance_sq = env.settings.freeze_tolerance * env.settings.freeze_tolerance;
        for (player, session) in env.players.connected() {
            let snapshot = *self.snapshots.entry(player.id()).or_insert_with(|| {
                debug!(player_id = %player.id(), "Freezing player");
                FrozenSnapshot {
                    position: session.position(),
                    health: session.health(),
                }
            });
            if session.position().distance_sq(&snapshot.position) > tolerance_sq {
                session.teleport(snapshot.position);
            }
            if session.health() != snapshot.health {
                session.set_health(snapshot.health);
            }
        }
        None
    }

    fn on_take_damage(&mut self, _env: &mut MatchEnv, _: &PlayerRecord, _: &DamageSource, _: f32) -> DamageOutcome {
        self.absorb()
    }

    fn on_block_used(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_use_entity(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_attack_entity(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_dropped(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_acquired(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }
}

/// Free building inside the legal region
pub struct Arena;

impl Arena {
    fn may_edit(env: &MatchEnv, player: &PlayerRecord, pos: BlockPos) -> bool {
        env.is_operator(player.id())
            || (!player.team().is_spectator() && env.settings.legal_region.contains(pos))
    }
}

impl Idling for Arena {}

impl Phase for Arena {
    fn name(&self) -> &'static str {
        "arena"
    }

    fn update(&mut self, _env: &mut MatchEnv) -> Option<MatchState> {
        None
    }

    fn on_respawn(&mut self, env: &mut MatchEnv, player: &PlayerRecord) {
        self.send_to_lobby(env, player);
    }

    fn on_take_damage(&mut self, _env: &mut MatchEnv, _: &PlayerRecord, _: &DamageSource, _: f32) -> DamageOutcome {
        self.absorb()
    }

    fn allow_block_break(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos) -> bool {
        Self::may_edit(env, player, pos)
    }

    fn on_block_placed(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos, _block: BlockState) -> bool {
        Self::may_edit(env, player, pos)
    }

    fn on_attack_block(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::Pass
    }

    fn on_item_dropped(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_acquired(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }
}

/// Practice fights without consequences; no friendly fire
pub struct Skirmishing;

impl Idling for Skirmishing {}

impl Phase for Skirmishing {
    fn name(&self) -> &'static str {
        "skirmishing"
    }

    fn update(&mut self, _env: &mut MatchEnv) -> Option<MatchState> {
        None
    }

    fn on_respawn(&mut self, env: &mut MatchEnv, player: &PlayerRecord) {
        self.send_to_lobby(env, player);
    }

    fn on_take_damage(&mut self, _env: &mut MatchEnv, _: &PlayerRecord, _: &DamageSource, _: f32) -> DamageOutcome {
        self.absorb()
    }

    fn on_attack_block(&mut self, _env: &mut MatchEnv, _player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::Pass
    }

    fn on_attack_entity(&mut self, env: &mut MatchEnv, player: &PlayerRecord, target: &EntityRef) -> ActionResult {
        let EntityRef::Player(target_id) = target else {
            return ActionResult::Pass;
        };
        match env.players.get(target_id) {
            Some(target) if player.team().is_ally_of(&target.team()) => ActionResult::Fail,
            _ => ActionResult::Pass,
        }
    }

    fn on_item_dropped(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }

    fn on_item_acquired(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _item: &ItemStack) -> ActionResult {
        self.operator_only(env, player)
    }
}
