//! Raw adapter blocks → stored records.

use alloy_primitives::U256;

use crate::error::IndexerError;
use crate::types::{Block, ChainId, RawBlock, RawTransaction, Transaction, COINBASE_SENDER};

/// A normalized block ready to be checked and committed.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub block: Block,
    pub transactions: Vec<Transaction>,
    /// Transactions beyond the per-block cap that were not stored.
    pub dropped: usize,
}

/// Parse a hex (`0x…`) or decimal unsigned integer and re-emit it in decimal.
pub fn normalize_value(raw: &str) -> Result<String, IndexerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(IndexerError::Decode("empty value".into()));
    }
    trimmed
        .parse::<U256>()
        .map(|v| v.to_string())
        .map_err(|e| IndexerError::Decode(format!("invalid value {trimmed:?}: {e}")))
}

fn normalize_transaction(
    chain: &ChainId,
    height: u64,
    position: u32,
    raw: &RawTransaction,
) -> Result<Transaction, IndexerError> {
    let value = normalize_value(&raw.value).map_err(|e| match e {
        IndexerError::Decode(msg) => {
            IndexerError::Decode(format!("tx {} at block {height}: {msg}", raw.hash))
        }
        other => other,
    })?;
    Ok(Transaction {
        chain: chain.clone(),
        hash: raw.hash.clone(),
        from: raw
            .from
            .clone()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| COINBASE_SENDER.to_string()),
        to: raw.to.clone().unwrap_or_default(),
        value,
        block_height: height,
        position,
    })
}

/// Normalize `raw`, keeping at most `max_txs` transactions in block order.
pub fn normalize_block(
    chain: &ChainId,
    raw: &RawBlock,
    max_txs: usize,
) -> Result<Normalized, IndexerError> {
    let kept = raw.transactions.len().min(max_txs);
    let dropped = raw.transactions.len() - kept;

    let transactions = raw.transactions[..kept]
        .iter()
        .enumerate()
        .map(|(i, tx)| normalize_transaction(chain, raw.height, i as u32, tx))
        .collect::<Result<Vec<_>, _>>()?;

    if dropped > 0 {
        tracing::warn!(
            chain = %chain,
            height = raw.height,
            kept,
            dropped,
            "transaction cap reached, dropping the rest of the block"
        );
    }

    Ok(Normalized {
        block: Block {
            chain: chain.clone(),
            height: raw.height,
            hash: raw.hash.clone(),
            parent_hash: raw.parent_hash.clone(),
            timestamp: raw.timestamp,
            indexed_at: chrono::Utc::now().timestamp(),
            tx_count: transactions.len() as u32,
        },
        transactions,
        dropped,
    })
}
