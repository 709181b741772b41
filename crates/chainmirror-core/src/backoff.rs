//! Exponential backoff for retryable sync failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry, in milliseconds.
    pub initial_ms: u64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_ms: u64,
    /// Growth factor applied after each consecutive failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Tracks consecutive failures and yields the next delay.
///
/// Retries are unlimited; the ceiling bounds each wait and a success resets
/// the sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms =
            self.config.initial_ms as f64 * self.config.multiplier.max(1.0).powi(self.attempt as i32);
        let capped = base_ms.min(self.config.max_ms as f64);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped as u64)
    }

    /// Consecutive failures since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Forget past failures after a successful step.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
