//! Per-chain sync configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;

/// Configuration for one chain's sync loop.
///
/// The chain tag is not part of it: records are stamped with the adapter's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// First height to mirror when no cursor exists. `None` = head-relative backfill.
    pub start_height: Option<u64>,
    /// Number of blocks up to and including head to mirror on a fresh start.
    pub backfill_depth: u64,
    /// Transactions stored per block; the rest are dropped with a warning.
    pub max_transactions_per_block: usize,
    /// Deepest reorg the resolver will walk back before giving up.
    pub max_reorg_depth: u64,
    /// Head polling interval in live mode (milliseconds).
    pub poll_interval_ms: u64,
    /// Wait after a block was reported as not yet available (milliseconds).
    pub not_ready_delay_ms: u64,
    pub backoff: BackoffConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_height: None,
            backfill_depth: 20,
            max_transactions_per_block: 100,
            max_reorg_depth: 64,
            poll_interval_ms: 30_000,
            not_ready_delay_ms: 1_000,
            backoff: BackoffConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn not_ready_delay(&self) -> Duration {
        Duration::from_millis(self.not_ready_delay_ms)
    }
}
