use super::{MatchState, Phase, Waiting};
use crate::game::context::MatchEnv;

/// Post-round pause, then back to Waiting
pub struct Finalizing {
    remaining: u32,
}

impl Finalizing {
    pub fn new(ticks: u32) -> Self {
        Self { remaining: ticks }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Phase for Finalizing {
    fn name(&self) -> &'static str {
        "finalizing"
    }

    fn update(&mut self, _env: &mut MatchEnv) -> Option<MatchState> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Some(MatchState::Waiting(Waiting))
        } else {
            None
        }
    }
}
