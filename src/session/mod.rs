//! Connection/session layer glue
//!
//! Network sessions are owned here; player records only hold weak references
//! to them. Gameplay intents are rate limited per player and forwarded onto
//! the simulation thread, which answers each one with a [`Verdict`].

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::hooks::{Intent, Verdict};
use crate::game::player::{PlayerRecord, PlayerRegistry, Presentation};
use crate::util::rate_limit::IntentLimiter;
use crate::world::Vec3;

/// Capacity of the intent channel into the simulation thread
pub const INTENT_QUEUE_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Transient id of one network connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// What the match may do to a connected participant's avatar
pub trait Session: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn position(&self) -> Vec3;

    fn teleport(&self, to: Vec3);

    fn health(&self) -> f32;

    fn set_health(&self, health: f32);

    fn max_health(&self) -> f32 {
        20.0
    }

    /// Full health and hunger, no status effects
    fn restore_vitals(&self);

    fn present(&self, presentation: &Presentation);

    fn send_message(&self, text: &str);
}

struct LocalState {
    position: Vec3,
    health: f32,
    hunger: u32,
    effects: Vec<String>,
    presentation: Option<Presentation>,
    presentations: usize,
    messages: Vec<String>,
}

/// In-process session. Used for tests and for bots driven by the host.
pub struct LocalSession {
    id: SessionId,
    state: Mutex<LocalState>,
}

impl LocalSession {
    pub fn new(position: Vec3) -> Self {
        Self {
            id: SessionId::next(),
            state: Mutex::new(LocalState {
                position,
                health: 20.0,
                hunger: 20,
                effects: Vec::new(),
                presentation: None,
                presentations: 0,
                messages: Vec::new(),
            }),
        }
    }

    /// Client-side movement
    pub fn move_to(&self, position: Vec3) {
        self.state.lock().position = position;
    }

    pub fn hunger(&self) -> u32 {
        self.state.lock().hunger
    }

    pub fn set_hunger(&self, hunger: u32) {
        self.state.lock().hunger = hunger;
    }

    pub fn add_effect(&self, effect: &str) {
        self.state.lock().effects.push(effect.to_string());
    }

    pub fn effects(&self) -> Vec<String> {
        self.state.lock().effects.clone()
    }

    /// Last presentation pushed
    pub fn presentation(&self) -> Option<Presentation> {
        self.state.lock().presentation.clone()
    }

    pub fn presentations_received(&self) -> usize {
        self.state.lock().presentations
    }

    pub fn messages(&self) -> Vec<String> {
        self.state.lock().messages.clone()
    }
}

impl Session for LocalSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn position(&self) -> Vec3 {
        self.state.lock().position
    }

    fn teleport(&self, to: Vec3) {
        self.state.lock().position = to;
    }

    fn health(&self) -> f32 {
        self.state.lock().health
    }

    fn set_health(&self, health: f32) {
        self.state.lock().health = health.clamp(0.0, self.max_health());
    }

    fn restore_vitals(&self) {
        let max = self.max_health();
        let mut state = self.state.lock();
        state.health = max;
        state.hunger = 20;
        state.effects.clear();
    }

    fn present(&self, presentation: &Presentation) {
        let mut state = self.state.lock();
        state.presentation = Some(presentation.clone());
        state.presentations += 1;
    }

    fn send_message(&self, text: &str) {
        self.state.lock().messages.push(text.to_string());
    }
}

/// Session layer errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Too many intents from player")]
    RateLimited,

    #[error("No connected player {0}")]
    UnknownPlayer(Uuid),

    #[error("Match runtime is not accepting intents")]
    RuntimeClosed,
}

/// Intent waiting for the simulation thread's decision
pub struct IntentEnvelope {
    pub intent: Intent,
    pub reply: oneshot::Sender<Verdict>,
}

pub fn intent_channel() -> (mpsc::Sender<IntentEnvelope>, mpsc::Receiver<IntentEnvelope>) {
    mpsc::channel(INTENT_QUEUE_CAPACITY)
}

/// Owns live sessions and feeds intents to the match
pub struct ConnectionLayer {
    players: Arc<PlayerRegistry>,
    sessions: DashMap<Uuid, Arc<dyn Session>>,
    limiter: IntentLimiter,
    intents: mpsc::Sender<IntentEnvelope>,
}

impl ConnectionLayer {
    pub fn new(
        players: Arc<PlayerRegistry>,
        intents: mpsc::Sender<IntentEnvelope>,
        intents_per_second: u32,
    ) -> Self {
        Self {
            players,
            sessions: DashMap::new(),
            limiter: IntentLimiter::new(intents_per_second),
            intents,
        }
    }

    /// Register a session for `id`, creating the record on first sight
    pub fn connect(&self, id: Uuid, name: &str, session: Arc<dyn Session>) -> Arc<PlayerRecord> {
        let record = self.players.get_or_create(id, name);
        record.set_name(name);
        record.attach_session(&session);
        if let Some(previous) = self.sessions.insert(id, session) {
            debug!(player_id = %id, session = previous.session_id().0, "Replaced existing session");
        }
        info!(player_id = %id, name, "Player connected");
        record
    }

    /// Drop the session. The record stays in the registry.
    pub fn disconnect(&self, id: Uuid) -> bool {
        self.limiter.forget(&id);
        match self.sessions.remove(&id) {
            Some(_) => {
                if let Some(record) = self.players.get(&id) {
                    record.detach_session();
                }
                info!(player_id = %id, "Player disconnected");
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Forward an intent and wait for the match's decision. A denied verdict
    /// means the host must reject the underlying action.
    pub async fn submit(&self, intent: Intent) -> Result<Verdict, SessionError> {
        let actor = intent.actor();
        if !self.sessions.contains_key(&actor) {
            return Err(SessionError::UnknownPlayer(actor));
        }
        if !self.limiter.check(actor) {
            debug!(player_id = %actor, intent = intent.name(), "Intent rate limited");
            return Err(SessionError::RateLimited);
        }

        let (reply, verdict) = oneshot::channel();
        self.intents
            .send(IntentEnvelope { intent, reply })
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        verdict.await.map_err(|_| SessionError::RuntimeClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::hooks::DamageKind;
    use crate::game::hooks::DamageSource;
    use crate::world::BlockPos;

    fn layer(limit: u32) -> (ConnectionLayer, mpsc::Receiver<IntentEnvelope>, Arc<PlayerRegistry>) {
        let players = Arc::new(PlayerRegistry::new());
        let (tx, rx) = intent_channel();
        (ConnectionLayer::new(players.clone(), tx, limit), rx, players)
    }

    fn break_intent(player: Uuid) -> Intent {
        Intent::BlockBreak {
            player,
            pos: BlockPos::new(0, 64, 0),
        }
    }

    #[test]
    fn connect_and_disconnect_track_the_record() {
        let (layer, _rx, players) = layer(10);
        let id = Uuid::new_v4();
        let record = layer.connect(id, "dave", Arc::new(LocalSession::new(Vec3::default())));
        assert!(record.is_connected());
        assert_eq!(players.len(), 1);

        assert!(layer.disconnect(id));
        assert!(!record.is_connected());
        assert!(!layer.disconnect(id));
        // Records outlive sessions
        assert!(players.get(&id).is_some());
    }

    #[test]
    fn reconnect_reuses_the_record() {
        let (layer, _rx, _players) = layer(10);
        let id = Uuid::new_v4();
        let first = layer.connect(id, "erin", Arc::new(LocalSession::new(Vec3::default())));
        layer.disconnect(id);
        let second = layer.connect(id, "Erin", Arc::new(LocalSession::new(Vec3::default())));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.name(), "Erin");
    }

    #[tokio::test]
    async fn submit_waits_for_the_verdict() {
        let (layer, mut rx, _players) = layer(10);
        let id = Uuid::new_v4();
        layer.connect(id, "frank", Arc::new(LocalSession::new(Vec3::default())));

        let responder = tokio::spawn(async move {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.intent.name(), "block_break");
            envelope.reply.send(Verdict::Deny).unwrap();
        });

        assert_eq!(layer.submit(break_intent(id)).await.unwrap(), Verdict::Deny);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn submit_rejects_unknown_players() {
        let (layer, _rx, _players) = layer(10);
        let stranger = Uuid::new_v4();
        let result = layer
            .submit(Intent::Death {
                victim: stranger,
                source: DamageSource::environment(DamageKind::Fall),
            })
            .await;
        assert!(matches!(result, Err(SessionError::UnknownPlayer(id)) if id == stranger));
    }

    #[tokio::test]
    async fn submit_rate_limits_per_player() {
        let (layer, mut rx, _players) = layer(1);
        let id = Uuid::new_v4();
        layer.connect(id, "gina", Arc::new(LocalSession::new(Vec3::default())));

        let responder = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let _ = envelope.reply.send(Verdict::Allow);
            }
        });

        assert!(layer.submit(break_intent(id)).await.is_ok());
        assert!(matches!(
            layer.submit(break_intent(id)).await,
            Err(SessionError::RateLimited)
        ));
        drop(layer);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_reply_means_runtime_closed() {
        let (layer, rx, _players) = layer(10);
        let id = Uuid::new_v4();
        layer.connect(id, "hank", Arc::new(LocalSession::new(Vec3::default())));
        drop(rx);
        assert!(matches!(
            layer.submit(break_intent(id)).await,
            Err(SessionError::RuntimeClosed)
        ));
    }

    #[test]
    fn local_session_restores_vitals() {
        let session = LocalSession::new(Vec3::default());
        session.set_health(3.0);
        session.set_hunger(4);
        session.add_effect("poison");
        session.restore_vitals();
        assert_eq!(session.health(), 20.0);
        assert_eq!(session.hunger(), 20);
        assert!(session.effects().is_empty());
    }
}
