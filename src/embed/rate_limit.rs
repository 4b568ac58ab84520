//! Call spacing for the embedding API

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::time::Duration;
use tracing::trace;

/// Enforces a minimum interval between successive calls
///
/// The quota holds a single cell replenished once per `interval`, so calls
/// never burst: the first call proceeds immediately and each later call waits
/// until `interval` has passed since the previous one.
pub struct CallRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    interval: Duration,
}

impl CallRateLimiter {
    /// Create a limiter, or `None` when `interval` is zero
    pub fn new(interval: Duration) -> Option<Self> {
        let quota = Quota::with_period(interval)?.allow_burst(nonzero!(1u32));
        Some(Self {
            limiter: RateLimiter::direct(quota),
            interval,
        })
    }

    /// Wait until the next call is allowed
    pub async fn wait(&self) {
        if self.limiter.check().is_err() {
            trace!("Rate limiting: waiting up to {:?}", self.interval);
            self.limiter.until_ready().await;
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
