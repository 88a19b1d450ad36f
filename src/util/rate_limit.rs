//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Spawn requests allowed per peer per second
pub const SPAWN_RATE_LIMIT: u32 = 2;

/// Pings allowed per peer per second
pub const PING_RATE_LIMIT: u32 = 10;

/// Per-peer rate limiter state
#[derive(Clone)]
pub struct PeerRateLimiter {
    spawn_limiter: Arc<Limiter>,
    ping_limiter: Arc<Limiter>,
}

impl PeerRateLimiter {
    pub fn new() -> Self {
        Self {
            spawn_limiter: create_limiter(SPAWN_RATE_LIMIT),
            ping_limiter: create_limiter(PING_RATE_LIMIT),
        }
    }

    /// Check if a spawn request is allowed (returns true if allowed)
    pub fn check_spawn(&self) -> bool {
        self.spawn_limiter.check().is_ok()
    }

    /// Check if a ping is allowed (returns true if allowed)
    pub fn check_ping(&self) -> bool {
        self.ping_limiter.check().is_ok()
    }
}

impl Default for PeerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_burst_is_limited() {
        let limiter = PeerRateLimiter::new();
        let allowed = (0..10).filter(|_| limiter.check_spawn()).count();
        assert_eq!(allowed, SPAWN_RATE_LIMIT as usize);
    }
}
