//! Outbound match director channel

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::ws::protocol::{Announcement, RoundOutcome};

/// Receives round and duel outcomes. The match only ever calls into it.
pub trait MatchDirector: Send + Sync {
    fn announce(&self, announcement: Announcement);

    /// Side-effect hook invoked once when a team round is decided
    fn round_ended(&self, outcome: &RoundOutcome) {
        self.announce(Announcement::RoundEnded {
            outcome: outcome.clone(),
        });
    }
}

/// Fans announcements out to every subscriber (e.g. the `/ws` stream)
#[derive(Clone)]
pub struct BroadcastDirector {
    tx: broadcast::Sender<Announcement>,
}

impl BroadcastDirector {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Announcement> {
        self.tx.subscribe()
    }
}

impl MatchDirector for BroadcastDirector {
    fn announce(&self, announcement: Announcement) {
        match &announcement {
            Announcement::Countdown { .. } | Announcement::PhaseChanged { .. } => {
                debug!(?announcement, "Announcement")
            }
            _ => info!(?announcement, "Announcement"),
        }
        // No subscribers is fine
        let _ = self.tx.send(announcement);
    }
}

#[cfg(test)]
pub use recording::RecordingDirector;

#[cfg(test)]
mod recording {
    use parking_lot::Mutex;

    use super::MatchDirector;
    use crate::ws::protocol::{Announcement, RoundOutcome};

    /// Keeps everything it was told, for assertions
    #[derive(Default)]
    pub struct RecordingDirector {
        pub announcements: Mutex<Vec<Announcement>>,
        pub outcomes: Mutex<Vec<RoundOutcome>>,
    }

    impl RecordingDirector {
        pub fn saw(&self, wanted: &Announcement) -> bool {
            self.announcements.lock().iter().any(|a| a == wanted)
        }

        pub fn count(&self, pred: impl Fn(&Announcement) -> bool) -> usize {
            self.announcements.lock().iter().filter(|a| pred(a)).count()
        }
    }

    impl MatchDirector for RecordingDirector {
        fn announce(&self, announcement: Announcement) {
            self.announcements.lock().push(announcement);
        }

        fn round_ended(&self, outcome: &RoundOutcome) {
            self.outcomes.lock().push(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::team::Side;

    #[test]
    fn broadcast_reaches_subscribers() {
        let director = BroadcastDirector::new(8);
        let mut rx = director.subscribe();
        director.announce(Announcement::TeamVictory { side: Side::Yellow });
        assert_eq!(
            rx.try_recv().unwrap(),
            Announcement::TeamVictory { side: Side::Yellow }
        );
    }

    #[test]
    fn announcing_without_subscribers_is_harmless() {
        let director = BroadcastDirector::new(8);
        director.announce(Announcement::Draw);
    }
}
