//! Rate limiting for gameplay intents

use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use uuid::Uuid;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Default cap on gameplay intents per player per second
pub const INTENT_RATE_LIMIT: u32 = 40;

/// Per-player intent limiters, created on first use
pub struct IntentLimiter {
    per_second: u32,
    limiters: DashMap<Uuid, Arc<Limiter>>,
}

impl IntentLimiter {
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second,
            limiters: DashMap::new(),
        }
    }

    /// Check if an intent from this player is allowed (returns true if allowed)
    pub fn check(&self, player_id: Uuid) -> bool {
        let limiter = self
            .limiters
            .entry(player_id)
            .or_insert_with(|| create_limiter(self.per_second))
            .clone();
        limiter.check().is_ok()
    }

    /// Drop a player's limiter (on disconnect)
    pub fn forget(&self, player_id: &Uuid) {
        self.limiters.remove(player_id);
    }
}

impl Default for IntentLimiter {
    fn default() -> Self {
        Self::new(INTENT_RATE_LIMIT)
    }
}
