//! Reconnect Backoff
//!
//! Delay between gateway reconnect attempts. The window doubles with every
//! attempt up to a cap, and the actual delay is drawn uniformly from it.

use std::time::Duration;

use rand::Rng;

/// Reconnect delay policy
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            attempt: 0,
        }
    }

    /// Reconnect attempts since the last established session.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Largest delay the current attempt may wait.
    pub fn ceiling(&self) -> Duration {
        let window = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(self.attempt))
            .min(self.max_ms);
        Duration::from_millis(window)
    }

    /// Draw the delay for this attempt and move on to the next one.
    pub fn next_delay(&mut self) -> Duration {
        let window = self.ceiling().as_millis() as u64;
        let delay = rand::rng().random_range(0..=window);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
