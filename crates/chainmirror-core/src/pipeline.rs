//! Ingestion pipeline: fetch, normalize, check linkage, commit.
//!
//! The pipeline holds no state between calls. Everything it learns about a
//! height is handed to the store in one [`BlockCommit`].

use std::sync::Arc;

use serde::Serialize;

use crate::adapter::ChainAdapter;
use crate::error::IndexerError;
use crate::normalize::normalize_block;
use crate::reorg::{Linkage, ReorgEvent, ReorgResolver};
use crate::store::{BlockCommit, ChainStore};
use crate::types::{BlockRef, ChainId};

/// What was written for one committed height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub height: u64,
    pub hash: String,
    /// Transactions stored.
    pub transactions: usize,
    /// Transactions dropped by the per-block cap.
    pub dropped: usize,
}

/// Result of ingesting one height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Committed(CommitSummary),
    /// The adapter does not have the block yet.
    NotYetAvailable,
    /// The block did not extend the stored chain; the store was rolled back.
    Reorged(ReorgEvent),
}

/// Turns one remote height into one atomic store commit.
pub struct IngestPipeline {
    adapter: Arc<dyn ChainAdapter>,
    store: Arc<dyn ChainStore>,
    resolver: ReorgResolver,
    max_transactions: usize,
}

impl IngestPipeline {
    pub fn new(
        adapter: Arc<dyn ChainAdapter>,
        store: Arc<dyn ChainStore>,
        resolver: ReorgResolver,
        max_transactions: usize,
    ) -> Self {
        Self {
            adapter,
            store,
            resolver,
            max_transactions,
        }
    }

    pub fn chain(&self) -> &ChainId {
        self.adapter.chain()
    }

    /// Ingest the block at `height`.
    ///
    /// Nothing is written unless the final commit succeeds, so an error at any
    /// step leaves the store as it was.
    pub async fn ingest(&self, height: u64) -> Result<IngestOutcome, IndexerError> {
        let chain = self.adapter.chain();

        let Some(raw) = self.adapter.fetch_block(&BlockRef::Height(height)).await? else {
            tracing::debug!(chain = %chain, height, "block not yet available");
            return Ok(IngestOutcome::NotYetAvailable);
        };
        if raw.height != height {
            return Err(IndexerError::TransientNetwork(format!(
                "asked {chain} for block {height}, got {}",
                raw.height
            )));
        }

        let normalized = normalize_block(chain, &raw, self.max_transactions)?;

        if let Linkage::Mismatch { stored } =
            self.resolver.check_linkage(self.store.as_ref(), &normalized.block).await?
        {
            tracing::warn!(
                chain = %chain,
                height,
                parent_hash = %normalized.block.parent_hash,
                stored = %stored,
                "Parent hash mismatch"
            );
            let event = self
                .resolver
                .resolve(self.adapter.as_ref(), self.store.as_ref(), height)
                .await?;
            return Ok(IngestOutcome::Reorged(event));
        }

        let summary = CommitSummary {
            height,
            hash: normalized.block.hash.clone(),
            transactions: normalized.transactions.len(),
            dropped: normalized.dropped,
        };
        self.store
            .commit(&BlockCommit {
                block: normalized.block,
                transactions: normalized.transactions,
            })
            .await?;

        tracing::debug!(
            chain = %chain,
            height,
            hash = %summary.hash,
            txs = summary.transactions,
            "block committed"
        );
        Ok(IngestOutcome::Committed(summary))
    }

    /// Compare the stored block at `height` with the node's block there.
    ///
    /// Catches a reorg that replaced the tip with a branch of the same or
    /// lower height, which never produces a block above the cursor. On a
    /// mismatch the store is rolled back as if `height + 1` had failed linkage.
    pub async fn recheck_tip(&self, height: u64) -> Result<Option<ReorgEvent>, IndexerError> {
        let chain = self.adapter.chain();
        let Some(stored) = self.store.block_hash(chain, height).await? else {
            return Ok(None);
        };
        let remote = self.adapter.fetch_block(&BlockRef::Height(height)).await?;
        match remote {
            Some(block) if block.hash == stored => Ok(None),
            // A lagging node that has not seen this height yet proves nothing.
            None => Ok(None),
            Some(block) => {
                tracing::warn!(
                    chain = %chain,
                    height,
                    stored = %stored,
                    remote = %block.hash,
                    "Stored tip is no longer canonical"
                );
                let event = self
                    .resolver
                    .resolve(self.adapter.as_ref(), self.store.as_ref(), height + 1)
                    .await?;
                Ok(Some(event))
            }
        }
    }
}
