//! Pacing for outgoing Bot API calls.
//!
//! Telegram throttles bots that send faster than roughly thirty messages per
//! second and answers 429 with a `retry_after` hint. Every call goes through
//! [`RateLimiter::wait_and_acquire`]; flood waits push the next slot back.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rate limiter that enforces minimum intervals between API calls.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between two calls.
    min_interval: Duration,

    /// Earliest instant at which the next call may start.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the specified minimum interval.
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Creates a rate limiter from milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Waits until a call is allowed, then reserves the following slot.
    ///
    /// Returns the duration waited (0 if no wait was needed).
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;

        let wait_duration = next.map_or(Duration::ZERO, |at| {
            at.saturating_duration_since(Instant::now())
        });

        if !wait_duration.is_zero() {
            debug!("Rate limiter: waiting {:?} before next call", wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        *next = Some(Instant::now() + self.min_interval);
        wait_duration
    }

    /// Records a flood wait from Telegram: no call starts before it elapses.
    pub async fn handle_flood_wait(&self, retry_after_secs: u32) {
        warn!(
            "Received flood wait from Telegram: {} seconds",
            retry_after_secs
        );
        let until = Instant::now() + Duration::from_secs(u64::from(retry_after_secs));
        let mut next = self.next_allowed.lock().await;
        if next.is_none_or(|at| at < until) {
            *next = Some(until);
        }
    }
}
