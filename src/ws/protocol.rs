//! Wire types pushed to observers of the match
//! These are serialized as JSON text frames on the announcement stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::team::Side;

/// Kind of round being started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    /// Yellow vs Blue
    Teams,
    /// Last duelist standing inside the arena
    Duel,
}

/// Result of a finished team round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    /// `None` on a draw
    pub winner: Option<Side>,
    /// Simulation tick the round was decided on
    pub tick: u64,
    pub decided_at: DateTime<Utc>,
}

/// Messages sent from the match to the director channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Announcement {
    /// Active phase changed
    PhaseChanged {
        from: String,
        to: String,
    },

    /// Pre-round countdown began
    RoundStarting {
        kind: RoundKind,
        seconds: u32,
    },

    /// Countdown tick
    Countdown {
        seconds: u32,
    },

    /// Countdown finished, fighting allowed
    RoundStarted {
        kind: RoundKind,
    },

    /// One side eliminated the other
    TeamVictory {
        side: Side,
    },

    /// Nobody survived
    Draw,

    /// Last duelist standing
    DuelVictory {
        player_id: Uuid,
        name: String,
    },

    /// Round-end side effects for collaborators (stats, rewards)
    RoundEnded {
        outcome: RoundOutcome,
    },
}

/// Player row for the status surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub player_id: Uuid,
    pub name: String,
    pub team: String,
    pub alive: bool,
    pub connected: bool,
    pub kills: u32,
    pub deaths: u32,
}
