//! In-memory store for tests and ephemeral mirrors.
//!
//! All data is lost when the process exits. One mutex guards every chain, so
//! each commit and rollback is trivially atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::IndexerError;
use crate::store::{BlockCommit, ChainStore, QueryStore};
use crate::types::{Block, BlockRef, BlockWithTransactions, ChainId, Transaction};

#[derive(Default)]
struct ChainTables {
    blocks: BTreeMap<u64, Block>,
    transactions: HashMap<String, Transaction>,
    cursor: Option<Cursor>,
}

impl ChainTables {
    /// Remove blocks at or above `height` together with their transactions.
    fn truncate_from(&mut self, height: u64) -> u64 {
        let removed = self.blocks.split_off(&height);
        self.transactions.retain(|_, tx| tx.block_height < height);
        removed.len() as u64
    }

    fn block_transactions(&self, height: u64) -> Vec<Transaction> {
        let mut txs: Vec<_> = self
            .transactions
            .values()
            .filter(|tx| tx.block_height == height)
            .cloned()
            .collect();
        txs.sort_by_key(|tx| tx.position);
        txs
    }
}

/// Newest block first, then block order.
fn newest_first(txs: &mut [Transaction]) {
    txs.sort_by(|a, b| {
        b.block_height
            .cmp(&a.block_height)
            .then(a.position.cmp(&b.position))
    });
}

/// In-memory mirror store.
#[derive(Default)]
pub struct MemoryStore {
    chains: Mutex<HashMap<ChainId, ChainTables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ChainId, ChainTables>>, IndexerError> {
        self.chains
            .lock()
            .map_err(|_| IndexerError::Storage("memory store lock poisoned".into()))
    }

    /// Number of stored blocks for `chain`.
    pub fn block_count(&self, chain: &ChainId) -> usize {
        self.lock()
            .map(|c| c.get(chain).map(|t| t.blocks.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of stored transactions for `chain`.
    pub fn transaction_count(&self, chain: &ChainId) -> usize {
        self.lock()
            .map(|c| c.get(chain).map(|t| t.transactions.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Stored heights for `chain`, ascending.
    pub fn heights(&self, chain: &ChainId) -> Vec<u64> {
        self.lock()
            .map(|c| {
                c.get(chain)
                    .map(|t| t.blocks.keys().copied().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChainStore for MemoryStore {
    async fn cursor(&self, chain: &ChainId) -> Result<Option<Cursor>, IndexerError> {
        Ok(self.lock()?.get(chain).and_then(|t| t.cursor.clone()))
    }

    async fn block_hash(&self, chain: &ChainId, height: u64) -> Result<Option<String>, IndexerError> {
        Ok(self
            .lock()?
            .get(chain)
            .and_then(|t| t.blocks.get(&height))
            .map(|b| b.hash.clone()))
    }

    async fn commit(&self, commit: &BlockCommit) -> Result<(), IndexerError> {
        let mut chains = self.lock()?;
        let tables = chains.entry(commit.chain().clone()).or_default();
        let height = commit.height();

        let replaced = tables
            .blocks
            .get(&height)
            .is_some_and(|b| b.hash != commit.block.hash);
        if replaced {
            tables.truncate_from(height);
        } else {
            tables.transactions.retain(|_, tx| tx.block_height != height);
        }

        for tx in &commit.transactions {
            tables.transactions.insert(tx.hash.clone(), tx.clone());
        }
        tables.blocks.insert(height, commit.block.clone());

        let advance = match &tables.cursor {
            None => true,
            Some(c) => replaced || c.height < height,
        };
        if advance {
            tables.cursor = Some(Cursor::new(
                commit.chain().clone(),
                height,
                commit.block.hash.clone(),
            ));
        }
        Ok(())
    }

    async fn rollback_to(&self, chain: &ChainId, ancestor: u64) -> Result<u64, IndexerError> {
        let mut chains = self.lock()?;
        let tables = chains.entry(chain.clone()).or_default();
        let removed = tables.truncate_from(ancestor + 1);
        let hash = tables
            .blocks
            .get(&ancestor)
            .map(|b| b.hash.clone())
            .unwrap_or_default();
        tables.cursor = Some(Cursor::new(chain.clone(), ancestor, hash));
        Ok(removed)
    }
}

#[async_trait]
impl QueryStore for MemoryStore {
    async fn latest_blocks(&self, chain: &ChainId, limit: usize) -> Result<Vec<Block>, IndexerError> {
        Ok(self
            .lock()?
            .get(chain)
            .map(|t| t.blocks.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn block(
        &self,
        chain: &ChainId,
        at: &BlockRef,
    ) -> Result<Option<BlockWithTransactions>, IndexerError> {
        let chains = self.lock()?;
        let Some(tables) = chains.get(chain) else {
            return Ok(None);
        };
        let block = match at {
            BlockRef::Height(h) => tables.blocks.get(h),
            BlockRef::Hash(hash) => tables.blocks.values().find(|b| &b.hash == hash),
        };
        Ok(block.map(|b| BlockWithTransactions {
            block: b.clone(),
            transactions: tables.block_transactions(b.height),
        }))
    }

    async fn transaction(&self, chain: &ChainId, hash: &str) -> Result<Option<Transaction>, IndexerError> {
        Ok(self
            .lock()?
            .get(chain)
            .and_then(|t| t.transactions.get(hash))
            .cloned())
    }

    async fn latest_transactions(
        &self,
        chain: &ChainId,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError> {
        let chains = self.lock()?;
        let mut txs: Vec<_> = chains
            .get(chain)
            .map(|t| t.transactions.values().cloned().collect())
            .unwrap_or_default();
        newest_first(&mut txs);
        txs.truncate(limit);
        Ok(txs)
    }

    async fn address_transactions(
        &self,
        chain: &ChainId,
        address: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, IndexerError> {
        let chains = self.lock()?;
        let mut txs: Vec<_> = chains
            .get(chain)
            .map(|t| {
                t.transactions
                    .values()
                    .filter(|tx| tx.touches(address))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        newest_first(&mut txs);
        txs.truncate(limit);
        Ok(txs)
    }
}
