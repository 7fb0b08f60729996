// argus-device/src/backoff.rs
use crate::LoopTiming;
use std::time::Duration;

/// Consecutive-failure bookkeeping for one device.
///
/// Failures `1..=threshold` sleep `retry_delay`, anything beyond
/// sleeps `hibernate_delay`; one good read drops straight back to
/// `normal_delay`.
#[derive(Debug, Clone)]
pub struct Backoff {
    timing: LoopTiming,
    failures: u32,
    delay: Duration,
}

impl Backoff {
    pub fn new(timing: LoopTiming) -> Self {
        Self { timing, failures: 0, delay: timing.normal_delay }
    }

    /// Record a failed read and return the next inter-tick delay.
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay = if self.failures > self.timing.failure_threshold {
            self.timing.hibernate_delay
        } else {
            self.timing.retry_delay
        };
        self.delay
    }

    pub fn succeed(&mut self) {
        self.failures = 0;
        self.delay = self.timing.normal_delay;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_degraded(&self) -> bool {
        self.failures > 0
    }
}
