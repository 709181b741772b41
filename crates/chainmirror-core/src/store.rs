//! Storage traits — the write side used by the pipeline and the read side
//! exposed to query consumers.
//!
//! Implementations include [`MemoryStore`](crate::memory::MemoryStore) and, in
//! `chainmirror-storage`, `SqliteStorage` and `PostgresStorage`.

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::IndexerError;
use crate::types::{Block, BlockRef, BlockWithTransactions, ChainId, Transaction};

/// Everything written for one height, committed as a single unit.
#[derive(Debug, Clone)]
pub struct BlockCommit {
    pub block: Block,
    pub transactions: Vec<Transaction>,
}

impl BlockCommit {
    pub fn chain(&self) -> &ChainId {
        &self.block.chain
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }
}

/// Write side of the store, owned by the ingestion pipeline.
///
/// # Atomicity
/// `commit` and `rollback_to` must each be all-or-nothing: a reader never sees
/// a block without its transactions, nor a cursor ahead of committed data.
#[async_trait]
pub trait ChainStore: Send + Sync {
    /// Load the cursor for `chain` (`None` if never indexed).
    async fn cursor(&self, chain: &ChainId) -> Result<Option<Cursor>, IndexerError>;

    /// Hash of the stored block at `height`, if any.
    async fn block_hash(&self, chain: &ChainId, height: u64) -> Result<Option<String>, IndexerError>;

    /// Atomically write a block, its transactions and the cursor.
    ///
    /// - Any transactions previously stored for the same `(chain, height)` are
    ///   replaced, so re-committing the same block is idempotent.
    /// - If a block with a *different* hash was stored at that height, it and
    ///   every stored descendant are superseded.
    /// - The cursor moves to the committed height unless it is already past it
    ///   and the block was unchanged.
    async fn commit(&self, commit: &BlockCommit) -> Result<(), IndexerError>;

    /// Atomically delete every block (and its transactions) above `ancestor`
    /// and reset the cursor to `ancestor`. Returns the number of blocks removed.
    async fn rollback_to(&self, chain: &ChainId, ancestor: u64) -> Result<u64, IndexerError>;
}

/// Read side of the store. Never reports an indexing failure for data that is
/// simply not indexed yet: that is `None` / an empty list.
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Newest blocks first.
    async fn latest_blocks(&self, chain: &ChainId, limit: usize) -> Result<Vec<Block>, IndexerError>;

    /// Block by height or hash, with its transactions in block order.
    async fn block(
        &self,
        chain: &ChainId,
        at: &BlockRef,
    ) -> Result<Option<BlockWithTransactions>, IndexerError>;

    async fn transaction(&self, chain: &ChainId, hash: &str) -> Result<Option<Transaction>, IndexerError>;

    /// Transactions from the newest blocks first.
    async fn latest_transactions(
        &self,
        chain: &ChainId,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError>;

    /// Transactions where `address` is sender or recipient, newest first.
    async fn address_transactions(
        &self,
        chain: &ChainId,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError>;
}
