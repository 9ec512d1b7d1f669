//! Match rules: teams, players, phases and the context that ties them together

pub mod context;
pub mod director;
pub mod hooks;
pub mod player;
pub mod state;
pub mod team;

pub use context::{MatchContext, MatchEnv, MatchSettings, PrivilegeCatalog};
pub use director::{BroadcastDirector, MatchDirector};
pub use hooks::{ActionResult, DamageKind, DamageOutcome, DamageSource, EntityRef, Intent, ItemStack, Verdict};
pub use player::{PlayerRecord, PlayerRegistry, Presentation};
pub use state::MatchState;
pub use team::{Side, Team};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use uuid::Uuid;

    use super::context::{MatchContext, MatchEnv, MatchSettings};
    use super::director::RecordingDirector;
    use super::player::PlayerRecord;
    use super::state::MatchState;
    use super::team::Team;
    use crate::session::{LocalSession, Session};
    use crate::world::{ChunkedWorld, FlatGenerator, WorldExecutor, WorldHandle, WorldId, WorldLayout};

    pub fn spawn_world() -> WorldHandle {
        let world = ChunkedWorld::new(
            WorldId::new(),
            WorldLayout::default(),
            Box::new(FlatGenerator::new(7, 4)),
        );
        WorldExecutor::spawn(world).expect("spawn world executor")
    }

    pub fn context_with(initial: MatchState) -> (MatchContext, Arc<RecordingDirector>) {
        context_with_settings(initial, MatchSettings::default())
    }

    pub fn context_with_settings(
        initial: MatchState,
        settings: MatchSettings,
    ) -> (MatchContext, Arc<RecordingDirector>) {
        let director = Arc::new(RecordingDirector::default());
        let env = MatchEnv::new(
            spawn_world(),
            Arc::new(super::player::PlayerRegistry::new()),
            director.clone(),
            settings,
        );
        (MatchContext::new(env, initial), director)
    }

    /// Connected player standing in the middle of the legal region.
    /// Competitive teams start alive.
    pub fn join(env: &MatchEnv, name: &str, team: Team) -> (Arc<PlayerRecord>, Arc<LocalSession>) {
        let record = env.players.get_or_create(Uuid::new_v4(), name);
        record.set_team(team);
        record.set_alive(team.is_playing());
        let local = Arc::new(LocalSession::new(env.settings.legal_region.center()));
        let session: Arc<dyn Session> = local.clone();
        record.attach_session(&session);
        (record, local)
    }
}
