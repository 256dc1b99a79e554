//! Fixed-period tick driver for size polling.

use crate::config::MIN_POLL_INTERVAL;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Fires once per period. A tick that runs long delays the next one rather
/// than causing a burst of catch-up ticks.
#[derive(Debug)]
pub struct PollScheduler {
    interval: Interval,
}

impl PollScheduler {
    /// The first tick fires one full period after creation.
    pub fn new(period: Duration) -> Self {
        let period = period.max(MIN_POLL_INTERVAL);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Waits for the next tick. Cancel safe, so it can sit in a `select!`.
    pub async fn next_tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}
