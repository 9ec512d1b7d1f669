//! Player records and the identity-keyed registry

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::info;
use uuid::Uuid;

use super::team::Team;
use crate::session::{Session, SessionId};

/// What connected clients are shown for a player
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Presentation {
    pub display_name: String,
    pub team: Team,
    pub kills: u32,
    pub deaths: u32,
    pub score: u32,
}

struct RecordState {
    name: String,
    team: Team,
    alive: bool,
    kills: u32,
    deaths: u32,
    session: Option<Weak<dyn Session>>,
    /// Last presentation pushed to the session
    presented: Option<Presentation>,
}

/// Everything the match tracks about one participant
pub struct PlayerRecord {
    id: Uuid,
    state: RwLock<RecordState>,
}

impl PlayerRecord {
    fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            state: RwLock::new(RecordState {
                name: name.to_string(),
                team: Team::default(),
                alive: false,
                kills: 0,
                deaths: 0,
                session: None,
                presented: None,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    pub fn set_name(&self, name: &str) {
        self.state.write().name = name.to_string();
    }

    pub fn team(&self) -> Team {
        self.state.read().team
    }

    pub fn set_team(&self, team: Team) {
        self.state.write().team = team;
    }

    pub fn is_alive(&self) -> bool {
        self.state.read().alive
    }

    pub fn set_alive(&self, alive: bool) {
        self.state.write().alive = alive;
    }

    pub fn kills(&self) -> u32 {
        self.state.read().kills
    }

    pub fn deaths(&self) -> u32 {
        self.state.read().deaths
    }

    pub fn add_kills(&self, credit: u32) {
        let mut state = self.state.write();
        state.kills = state.kills.saturating_add(credit);
    }

    pub fn add_death(&self) {
        let mut state = self.state.write();
        state.deaths = state.deaths.saturating_add(1);
    }

    /// Clear kills and deaths for a fresh round
    pub fn reset_stats(&self) {
        let mut state = self.state.write();
        state.kills = 0;
        state.deaths = 0;
    }

    /// Live session handle, if the player is still connected
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.state.read().session.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    pub fn attach_session(&self, session: &Arc<dyn Session>) {
        let mut state = self.state.write();
        state.session = Some(Arc::downgrade(session));
        state.presented = None;
    }

    pub fn detach_session(&self) {
        let mut state = self.state.write();
        state.session = None;
        state.presented = None;
    }

    pub fn presentation(&self) -> Presentation {
        let state = self.state.read();
        Presentation {
            display_name: format!("{}{}", state.team.color_code(), state.name),
            team: state.team,
            kills: state.kills,
            deaths: state.deaths,
            score: state.kills,
        }
    }

    /// Push the presentation if it changed since the last push
    fn sync_presentation(&self) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        let current = self.presentation();
        {
            let mut state = self.state.write();
            if state.presented.as_ref() == Some(&current) {
                return false;
            }
            state.presented = Some(current.clone());
        }
        session.present(&current);
        true
    }
}

/// Thread-safe identity → record map
#[derive(Default)]
pub struct PlayerRegistry {
    players: Mutex<HashMap<Uuid, Arc<PlayerRecord>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `id`, created on first observation. Repeated calls return
    /// the same instance; `name` is only used at creation.
    pub fn get_or_create(&self, id: Uuid, name: &str) -> Arc<PlayerRecord> {
        let mut players = self.players.lock();
        players
            .entry(id)
            .or_insert_with(|| {
                info!(player_id = %id, name, "Player record created");
                Arc::new(PlayerRecord::new(id, name))
            })
            .clone()
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<PlayerRecord>> {
        self.players.lock().get(id).cloned()
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<PlayerRecord>> {
        self.players.lock().remove(id)
    }

    pub fn find_by_session(&self, session_id: SessionId) -> Option<Arc<PlayerRecord>> {
        self.players
            .lock()
            .values()
            .find(|p| p.session().is_some_and(|s| s.session_id() == session_id))
            .cloned()
    }

    /// Case-insensitive display name lookup
    pub fn find_by_name(&self, name: &str) -> Option<Arc<PlayerRecord>> {
        self.players
            .lock()
            .values()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.players.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.lock().is_empty()
    }

    /// Snapshot of every record
    pub fn all(&self) -> Vec<Arc<PlayerRecord>> {
        self.players.lock().values().cloned().collect()
    }

    /// Records with a live session, paired with it
    pub fn connected(&self) -> Vec<(Arc<PlayerRecord>, Arc<dyn Session>)> {
        self.all()
            .into_iter()
            .filter_map(|p| p.session().map(|s| (p, s)))
            .collect()
    }

    /// Push changed presentations to connected sessions. Returns how many were pushed.
    pub fn sync_presentation(&self) -> usize {
        self.all()
            .iter()
            .filter(|p| p.sync_presentation())
            .count()
    }
}
