//! Fluent builder for [`SyncConfig`].
//!
//! # Example
//!
//! ```rust
//! use chainmirror_core::builder::SyncConfigBuilder;
//!
//! let config = SyncConfigBuilder::new()
//!     .start_height(800_000)
//!     .backfill_depth(20)
//!     .poll_interval_ms(30_000)
//!     .build();
//! assert_eq!(config.start_height, Some(800_000));
//! ```

use crate::backoff::BackoffConfig;
use crate::config::SyncConfig;

/// Fluent builder for `SyncConfig`.
#[derive(Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    /// Start from an explicit height instead of head-relative backfill.
    pub fn start_height(mut self, height: u64) -> Self {
        self.config.start_height = Some(height);
        self
    }

    pub fn backfill_depth(mut self, depth: u64) -> Self {
        self.config.backfill_depth = depth;
        self
    }

    pub fn max_transactions_per_block(mut self, max: usize) -> Self {
        self.config.max_transactions_per_block = max;
        self
    }

    pub fn max_reorg_depth(mut self, depth: u64) -> Self {
        self.config.max_reorg_depth = depth;
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn not_ready_delay_ms(mut self, ms: u64) -> Self {
        self.config.not_ready_delay_ms = ms;
        self
    }

    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}
