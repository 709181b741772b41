//! Progress cursor — the persisted per-chain resume position.
//!
//! The cursor records the last height that was fully and correctly committed.
//! It is only ever written by the storage layer as part of the same atomic unit
//! as the block it points at, so cursor and data can never diverge.

use serde::{Deserialize, Serialize};

use crate::types::ChainId;

/// The last committed position of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub chain: ChainId,
    /// Last height known fully ingested.
    pub height: u64,
    /// Hash of the block at `height` (empty after a rollback below the first indexed block).
    pub hash: String,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

impl Cursor {
    pub fn new(chain: ChainId, height: u64, hash: impl Into<String>) -> Self {
        Self {
            chain,
            height,
            hash: hash.into(),
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Returns the next height to ingest (cursor + 1).
    pub fn next_height(&self) -> u64 {
        self.height + 1
    }

    /// Number of heights between the cursor and `head`.
    pub fn lag(&self, head: u64) -> u64 {
        head.saturating_sub(self.height)
    }
}

/// Height to start from when a chain has never been indexed.
///
/// An explicit `start_height` wins; otherwise the last `backfill_depth` blocks
/// up to and including `head` are mirrored.
pub fn initial_height(start_height: Option<u64>, backfill_depth: u64, head: u64) -> u64 {
    match start_height {
        Some(h) => h,
        None => (head + 1).saturating_sub(backfill_depth.max(1)),
    }
}
