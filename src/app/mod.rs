//! Application assembly: world, match runtime and shared HTTP state

pub mod runtime;
pub mod state;

pub use runtime::{MatchRuntime, RuntimeStatus};
pub use state::AppState;

use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::game::state::Waiting;
use crate::game::{
    BroadcastDirector, MatchContext, MatchEnv, MatchSettings, MatchState, PlayerRegistry, PrivilegeCatalog,
};
use crate::session::{intent_channel, ConnectionLayer};
use crate::world::{ChunkedWorld, FlatGenerator, WorldExecutor, WorldId, WorldLayout};

/// Buffered announcements per `/ws` subscriber
pub const ANNOUNCEMENT_BUFFER: usize = 256;

/// Build the world, the match context and the connection layer. The returned
/// runtime still has to be moved onto the simulation thread.
pub fn assemble(config: Config) -> std::io::Result<(AppState, MatchRuntime)> {
    let layout = WorldLayout::new(config.world_min_y, config.world_height);
    let world = ChunkedWorld::new(
        WorldId::new(),
        layout,
        Box::new(FlatGenerator::new(config.world_seed, config.surface_y)),
    );
    let world = WorldExecutor::spawn(world)?;
    info!(world = %world.id(), min_y = layout.min_y, height = layout.height, "World ready");

    let players = Arc::new(PlayerRegistry::new());
    let director = Arc::new(BroadcastDirector::new(ANNOUNCEMENT_BUFFER));

    let mut env = MatchEnv::new(
        world,
        players.clone(),
        director.clone(),
        MatchSettings::from_config(&config),
    );
    env.privileges = PrivilegeCatalog::new(config.operators.iter().copied());
    let context = MatchContext::new(env, MatchState::Waiting(Waiting));

    let (intent_tx, intent_rx) = intent_channel();
    let (runtime, status) = MatchRuntime::new(context, intent_rx);
    let connections = Arc::new(ConnectionLayer::new(
        players.clone(),
        intent_tx,
        config.intent_rate_limit,
    ));

    let state = AppState {
        config: Arc::new(config),
        players,
        director,
        connections,
        status,
    };
    Ok((state, runtime))
}
