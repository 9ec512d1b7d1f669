//! Application state shared across routes

use std::sync::Arc;
use tokio::sync::watch;

use super::runtime::RuntimeStatus;
use crate::config::Config;
use crate::game::{BroadcastDirector, PlayerRegistry};
use crate::session::ConnectionLayer;

/// Shared application state. Everything here is safe to touch off the
/// simulation thread.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub players: Arc<PlayerRegistry>,
    pub director: Arc<BroadcastDirector>,
    pub connections: Arc<ConnectionLayer>,
    pub status: watch::Receiver<RuntimeStatus>,
}
