//! Reorg detection and recovery.
//!
//! Every incoming block is checked against the stored block one height below.
//! On a parent-hash mismatch the resolver walks backward through the remote
//! chain until it finds a height whose hash agrees with the store (the common
//! ancestor), then rolls the store back to that height. Re-ingestion of the new
//! branch is left to the scheduler, which simply continues from the cursor.

use serde::Serialize;

use crate::adapter::ChainAdapter;
use crate::error::IndexerError;
use crate::store::ChainStore;
use crate::types::{Block, BlockRef, ChainId};

/// Describes a resolved chain reorganization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorgEvent {
    pub chain: ChainId,
    /// Height of the incoming block whose parent did not match.
    pub detected_at: u64,
    /// Last height on which the store and the remote chain agree.
    pub ancestor: u64,
    /// Number of stored heights that were rolled back.
    pub depth: u64,
    /// Hashes of the stored blocks found to be off the canonical chain, highest first.
    pub dropped: Vec<String>,
}

/// Result of a parent-linkage check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    /// Nothing stored one height below: first indexed height, nothing to check.
    Unanchored,
    /// The block's parent hash matches the stored predecessor.
    Extends,
    /// The stored predecessor has a different hash.
    Mismatch { stored: String },
}

/// Validates parent linkage and resolves reorgs up to a bounded depth.
#[derive(Debug, Clone, Copy)]
pub struct ReorgResolver {
    max_depth: u64,
}

impl ReorgResolver {
    pub fn new(max_depth: u64) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> u64 {
        self.max_depth
    }

    /// Compare `block.parent_hash` with the stored hash at `block.height - 1`.
    pub async fn check_linkage(
        &self,
        store: &dyn ChainStore,
        block: &Block,
    ) -> Result<Linkage, IndexerError> {
        let Some(parent_height) = block.height.checked_sub(1) else {
            return Ok(Linkage::Unanchored);
        };
        Ok(match store.block_hash(&block.chain, parent_height).await? {
            None => Linkage::Unanchored,
            Some(stored) if stored == block.parent_hash => Linkage::Extends,
            Some(stored) => Linkage::Mismatch { stored },
        })
    }

    /// Find the common ancestor below `detected_at` and roll the store back to it.
    ///
    /// Walks `detected_at - 1, detected_at - 2, …` re-fetching each height from
    /// the adapter. A height with no stored block counts as the ancestor (the
    /// walk passed below the first indexed height). Adapter errors propagate
    /// without touching the store. When the very first height checked already
    /// agrees, the event has depth 0 and the store is left as it was.
    pub async fn resolve(
        &self,
        adapter: &dyn ChainAdapter,
        store: &dyn ChainStore,
        detected_at: u64,
    ) -> Result<ReorgEvent, IndexerError> {
        let chain = adapter.chain().clone();
        let unresolvable = || IndexerError::UnresolvableReorg {
            chain: chain.clone(),
            height: detected_at,
            max_depth: self.max_depth,
        };

        let mut dropped = Vec::new();
        let mut height = detected_at.checked_sub(1).ok_or_else(unresolvable)?;

        let ancestor = loop {
            let Some(stored) = store.block_hash(&chain, height).await? else {
                break height;
            };
            let remote = adapter.fetch_block(&BlockRef::Height(height)).await?;
            if remote.as_ref().is_some_and(|b| b.hash == stored) {
                break height;
            }

            tracing::debug!(chain = %chain, height, stored = %stored, "block off canonical chain");
            dropped.push(stored);

            if dropped.len() as u64 > self.max_depth || height == 0 {
                return Err(unresolvable());
            }
            height -= 1;
        };

        let depth = dropped.len() as u64;
        if depth == 0 {
            // The node serves a parent hash that disagrees with its own block
            // one height below. Nothing stored is stale, so nothing is dropped.
            tracing::warn!(
                chain = %chain,
                detected_at,
                ancestor,
                "Node returned a block that does not extend its own predecessor"
            );
            return Ok(ReorgEvent {
                chain,
                detected_at,
                ancestor,
                depth,
                dropped,
            });
        }
        let removed = store.rollback_to(&chain, ancestor).await?;

        tracing::warn!(
            chain = %chain,
            detected_at,
            ancestor,
            depth,
            removed,
            "Reorg resolved, rolled back to common ancestor"
        );

        Ok(ReorgEvent {
            chain,
            detected_at,
            ancestor,
            depth,
            dropped,
        })
    }
}
