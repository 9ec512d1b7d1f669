//! Competitive phases: deaths count, rounds end

use chrono::Utc;
use tracing::info;

use super::{Finalizing, MatchState, Phase};
use crate::game::context::MatchEnv;
use crate::game::hooks::{ActionResult, DamageSource, EntityRef};
use crate::game::player::PlayerRecord;
use crate::game::team::Side;
use crate::world::{BlockPos, BlockState};
use crate::ws::protocol::{Announcement, RoundOutcome};

/// Behaviour shared by every competitive phase
pub trait Running: Phase {
    /// Death bookkeeping. Only a playing, alive victim counts; the attacker
    /// (another tracked player) earns double credit for high-value victims.
    fn record_death(&self, env: &MatchEnv, victim: &PlayerRecord, source: &DamageSource) {
        let team = victim.team();
        if !team.is_playing() || !victim.is_alive() {
            return;
        }
        victim.set_alive(false);
        victim.add_death();

        let attacker = source
            .attacker
            .filter(|id| *id != victim.id())
            .and_then(|id| env.players.get(&id));
        match attacker {
            Some(attacker) => {
                let credit = if team.is_high_value() { 2 } else { 1 };
                attacker.add_kills(credit);
                info!(
                    victim = %victim.id(),
                    attacker = %attacker.id(),
                    credit,
                    "Player killed"
                );
            }
            None => info!(victim = %victim.id(), kind = ?source.kind, "Player died"),
        }
    }

    /// Operators anywhere, alive participants inside the legal region
    fn may_edit(&self, env: &MatchEnv, player: &PlayerRecord, pos: BlockPos) -> bool {
        env.is_operator(player.id())
            || (env.is_active_participant(player) && env.settings.legal_region.contains(pos))
    }

    fn finish(&self, env: &MatchEnv) -> MatchState {
        MatchState::Finalizing(Finalizing::new(env.settings.finalize_ticks))
    }
}

/// Team round: Yellow against Blue until one side has nobody left standing
pub struct Playing;

impl Running for Playing {}

impl Phase for Playing {
    fn name(&self) -> &'static str {
        "playing"
    }

    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        let yellow = env.alive_on(Side::Yellow);
        let blue = env.alive_on(Side::Blue);

        let winner = match (yellow, blue) {
            (0, 0) => None,
            (0, _) => Some(Side::Blue),
            (_, 0) => Some(Side::Yellow),
            _ => return None,
        };

        match winner {
            Some(side) => env.director.announce(Announcement::TeamVictory { side }),
            None => env.director.announce(Announcement::Draw),
        }
        info!(winner = ?winner, tick = env.tick(), "Team round decided");
        env.director.round_ended(&RoundOutcome {
            winner,
            tick: env.tick(),
            decided_at: Utc::now(),
        });
        Some(self.finish(env))
    }

    fn allow_death(&mut self, env: &mut MatchEnv, victim: &PlayerRecord, source: &DamageSource) -> bool {
        self.record_death(env, victim, source);
        true
    }

    fn allow_block_break(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos) -> bool {
        self.may_edit(env, player, pos)
    }

    fn on_block_placed(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos, _block: BlockState) -> bool {
        self.may_edit(env, player, pos)
    }

    fn on_attack_block(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::allow_if(env.is_active_participant(player) || env.is_operator(player.id()))
    }

    fn on_attack_entity(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        ActionResult::allow_if(env.is_active_participant(player))
    }
}

/// Free-for-all: last duelist standing inside the legal region wins
pub struct Dueling;

impl Dueling {
    fn survivors(env: &MatchEnv) -> Vec<std::sync::Arc<PlayerRecord>> {
        let region = env.settings.legal_region;
        env.players
            .connected()
            .into_iter()
            .filter(|(player, session)| {
                env.is_active_participant(player) && region.contains_point(&session.position())
            })
            .map(|(player, _)| player)
            .collect()
    }
}

impl Running for Dueling {}

impl Phase for Dueling {
    fn name(&self) -> &'static str {
        "dueling"
    }

    fn update(&mut self, env: &mut MatchEnv) -> Option<MatchState> {
        let survivors = Self::survivors(env);
        match survivors.as_slice() {
            [] => {
                info!(tick = env.tick(), "Duel ended in a draw");
                env.director.announce(Announcement::Draw);
            }
            [winner] => {
                info!(player_id = %winner.id(), tick = env.tick(), "Duel won");
                env.director.announce(Announcement::DuelVictory {
                    player_id: winner.id(),
                    name: winner.name(),
                });
            }
            _ => return None,
        }
        Some(self.finish(env))
    }

    fn allow_death(&mut self, env: &mut MatchEnv, victim: &PlayerRecord, source: &DamageSource) -> bool {
        self.record_death(env, victim, source);
        true
    }

    fn allow_block_break(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos) -> bool {
        self.may_edit(env, player, pos)
    }

    fn on_block_placed(&mut self, env: &mut MatchEnv, player: &PlayerRecord, pos: BlockPos, _block: BlockState) -> bool {
        self.may_edit(env, player, pos)
    }

    fn on_attack_block(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _pos: BlockPos) -> ActionResult {
        ActionResult::allow_if(env.is_active_participant(player) || env.is_operator(player.id()))
    }

    fn on_attack_entity(&mut self, env: &mut MatchEnv, player: &PlayerRecord, _target: &EntityRef) -> ActionResult {
        ActionResult::allow_if(env.is_active_participant(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::hooks::{DamageKind, DamageOutcome, Intent, Verdict};
    use crate::game::team::Team;
    use crate::game::testing::{context_with, join};
    use crate::session::Session;
    use crate::world::Vec3;
    use uuid::Uuid;

    fn melee(attacker: Uuid) -> DamageSource {
        DamageSource::by_player(DamageKind::Melee, attacker)
    }

    #[test]
    fn playing_blue_wins_when_yellow_is_eliminated() {
        let (mut ctx, director) = context_with(MatchState::Playing(Playing));
        let (yellow, _s1) = join(ctx.env(), "y", Team::Yellow);
        let _b1 = join(ctx.env(), "b1", Team::Blue);
        let _b2 = join(ctx.env(), "b2", Team::BlueCaptain);
        ctx.update();
        assert_eq!(ctx.phase_name(), "playing");

        yellow.set_alive(false);
        ctx.update();
        assert_eq!(ctx.phase_name(), "finalizing");
        assert!(director.saw(&Announcement::TeamVictory { side: Side::Blue }));
        let outcomes = director.outcomes.lock();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].winner, Some(Side::Blue));
    }

    #[test]
    fn playing_simultaneous_elimination_is_a_draw() {
        let (mut ctx, director) = context_with(MatchState::Playing(Playing));
        let (yellow, _s1) = join(ctx.env(), "y", Team::Yellow);
        let (blue, _s2) = join(ctx.env(), "b", Team::Blue);
        yellow.set_alive(false);
        blue.set_alive(false);
        ctx.update();
        assert_eq!(ctx.phase_name(), "finalizing");
        assert!(director.saw(&Announcement::Draw));
        assert_eq!(director.outcomes.lock()[0].winner, None);
        assert_eq!(director.count(|a| matches!(a, Announcement::TeamVictory { .. })), 0);
    }

    #[test]
    fn playing_ignores_non_side_teams() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let _y = join(ctx.env(), "y", Team::Yellow);
        let _b = join(ctx.env(), "b", Team::Blue);
        let (duelist, _s) = join(ctx.env(), "d", Team::Duelist);
        duelist.set_alive(false);
        ctx.update();
        assert_eq!(ctx.phase_name(), "playing");
    }

    #[test]
    fn qualifying_death_credits_attacker() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (victim, _s1) = join(ctx.env(), "victim", Team::Yellow);
        let (killer, _s2) = join(ctx.env(), "killer", Team::Blue);

        assert!(ctx.allow_death(victim.id(), melee(killer.id())));
        assert!(!victim.is_alive());
        assert_eq!(victim.deaths(), 1);
        assert_eq!(killer.kills(), 1);
    }

    #[test]
    fn high_value_victim_doubles_credit() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (captain, _s1) = join(ctx.env(), "captain", Team::YellowCaptain);
        let (killer, _s2) = join(ctx.env(), "killer", Team::Blue);

        assert!(ctx.allow_death(captain.id(), melee(killer.id())));
        assert_eq!(captain.deaths(), 1);
        assert_eq!(killer.kills(), 2);
    }

    #[test]
    fn non_qualifying_deaths_change_nothing() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (dead, _s1) = join(ctx.env(), "dead", Team::Yellow);
        let (watcher, _s2) = join(ctx.env(), "watcher", Team::Spectator);
        let (killer, _s3) = join(ctx.env(), "killer", Team::Blue);
        dead.set_alive(false);

        assert!(ctx.allow_death(dead.id(), melee(killer.id())));
        assert!(ctx.allow_death(watcher.id(), melee(killer.id())));
        assert_eq!(dead.deaths(), 0);
        assert_eq!(watcher.deaths(), 0);
        assert_eq!(killer.kills(), 0);
    }

    #[test]
    fn self_and_environment_deaths_credit_nobody() {
        let (mut ctx, _director) = context_with(MatchState::Dueling(Dueling));
        let (a, _s1) = join(ctx.env(), "a", Team::Duelist);
        let (b, _s2) = join(ctx.env(), "b", Team::Duelist);
        let (c, _s3) = join(ctx.env(), "c", Team::Duelist);

        assert!(ctx.allow_death(a.id(), melee(a.id())));
        assert!(ctx.allow_death(b.id(), DamageSource::environment(DamageKind::Void)));
        assert!(ctx.allow_death(c.id(), melee(Uuid::new_v4())));
        for p in [&a, &b, &c] {
            assert_eq!(p.deaths(), 1);
            assert_eq!(p.kills(), 0);
        }
    }

    #[test]
    fn running_applies_damage() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (victim, _s) = join(ctx.env(), "v", Team::Blue);
        assert_eq!(
            ctx.on_take_damage(victim.id(), DamageSource::environment(DamageKind::Fall), 4.0),
            DamageOutcome::Apply(4.0)
        );
    }

    #[test]
    fn running_edits_need_alive_participant_in_region() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (player, _s1) = join(ctx.env(), "p", Team::Yellow);
        let (watcher, _s2) = join(ctx.env(), "w", Team::Spectator);
        let inside = BlockPos::new(0, 5, 0);
        let outside = BlockPos::new(0, 200, 0);
        let brk = |id, pos| Intent::BlockBreak { player: id, pos };

        assert_eq!(ctx.dispatch(&brk(player.id(), inside)), Verdict::Allow);
        assert_eq!(ctx.dispatch(&brk(player.id(), outside)), Verdict::Deny);
        assert_eq!(ctx.dispatch(&brk(watcher.id(), inside)), Verdict::Deny);

        player.set_alive(false);
        assert_eq!(ctx.dispatch(&brk(player.id(), inside)), Verdict::Deny);
        ctx.env_mut().privileges.grant(player.id());
        assert_eq!(ctx.dispatch(&brk(player.id(), outside)), Verdict::Allow);
    }

    #[test]
    fn running_attacks_need_alive_participant() {
        let (mut ctx, _director) = context_with(MatchState::Playing(Playing));
        let (player, _s1) = join(ctx.env(), "p", Team::Yellow);
        let (watcher, _s2) = join(ctx.env(), "w", Team::Spectator);
        let (op, _s3) = join(ctx.env(), "op", Team::Operator);
        let swing = |id| Intent::AttackEntity {
            player: id,
            target: EntityRef::Other(9),
        };
        let dig = |id| Intent::AttackBlock {
            player: id,
            pos: BlockPos::new(0, 0, 0),
        };

        assert_eq!(ctx.dispatch(&swing(player.id())), Verdict::Allow);
        assert_eq!(ctx.dispatch(&swing(watcher.id())), Verdict::Deny);
        assert_eq!(ctx.dispatch(&dig(watcher.id())), Verdict::Deny);
        assert_eq!(ctx.dispatch(&dig(op.id())), Verdict::Allow);
    }

    #[test]
    fn dueling_last_survivor_in_region_wins() {
        let (mut ctx, director) = context_with(MatchState::Dueling(Dueling));
        let (a, _s1) = join(ctx.env(), "alpha", Team::Duelist);
        let (_b, s2) = join(ctx.env(), "bravo", Team::Duelist);
        let (_c, s3) = join(ctx.env(), "charlie", Team::Duelist);
        ctx.update();
        assert_eq!(ctx.phase_name(), "dueling");

        // Out of bounds no longer counts
        s2.move_to(Vec3::new(1000.0, 10.0, 1000.0));
        ctx.update();
        assert_eq!(ctx.phase_name(), "dueling");

        s3.teleport(Vec3::new(-1000.0, 10.0, 0.0));
        ctx.update();
        assert_eq!(ctx.phase_name(), "finalizing");
        assert!(director.saw(&Announcement::DuelVictory {
            player_id: a.id(),
            name: "alpha".into(),
        }));
        // Duels do not report team outcomes
        assert!(director.outcomes.lock().is_empty());
    }

    #[test]
    fn dueling_with_nobody_left_is_a_draw() {
        let (mut ctx, director) = context_with(MatchState::Dueling(Dueling));
        let (a, _s1) = join(ctx.env(), "a", Team::Duelist);
        a.set_alive(false);
        ctx.update();
        assert_eq!(ctx.phase_name(), "finalizing");
        assert!(director.saw(&Announcement::Draw));
    }
}
