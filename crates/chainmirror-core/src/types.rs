//! Shared types for the mirroring pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sender recorded for transactions without an input address (miner rewards).
pub const COINBASE_SENDER: &str = "coinbase";

// ─── ChainId ─────────────────────────────────────────────────────────────────

/// Short tag identifying one mirrored chain (e.g. `"eth"`, `"btc"`).
///
/// Carried on every stored record so several chains can share one store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChainId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ChainId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ─── ChainKind ───────────────────────────────────────────────────────────────

/// The chain family an adapter speaks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// Account-based chain (EVM). Usually push-capable.
    #[serde(alias = "evm")]
    Account,
    /// UTXO-based chain (Bitcoin). Poll-only.
    #[serde(alias = "bitcoin", alias = "blockbook")]
    Utxo,
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Utxo => write!(f, "utxo"),
        }
    }
}

// ─── BlockRef ────────────────────────────────────────────────────────────────

/// Reference to a block either by height or by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockRef {
    Height(u64),
    Hash(String),
}

impl FromStr for BlockRef {
    type Err = std::convert::Infallible;

    /// Decimal input is a height; anything else is treated as a hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<u64>() {
            Ok(height) => Self::Height(height),
            Err(_) => Self::Hash(s.to_string()),
        })
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height(h) => write!(f, "{h}"),
            Self::Hash(h) => f.write_str(h),
        }
    }
}

impl From<u64> for BlockRef {
    fn from(height: u64) -> Self {
        Self::Height(height)
    }
}

// ─── Raw (adapter-side) records ──────────────────────────────────────────────

/// A transaction as reported by a chain adapter, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Sender, `None` for coinbase / miner-reward transactions.
    pub from: Option<String>,
    /// Recipient, `None` for contract creation or unspecified outputs.
    pub to: Option<String>,
    /// Transferred value in the smallest denomination, hex (`0x…`) or decimal.
    pub value: String,
}

/// A block as reported by a chain adapter, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u64,
    pub hash: String,
    pub parent_hash: String,
    /// Unix timestamp (seconds).
    pub timestamp: i64,
    pub transactions: Vec<RawTransaction>,
}

// ─── Stored records ──────────────────────────────────────────────────────────

/// A normalized block row, keyed by `(chain, height)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub chain: ChainId,
    pub height: u64,
    pub hash: String,
    pub parent_hash: String,
    /// Block timestamp reported by the chain (seconds since epoch).
    pub timestamp: i64,
    /// When the block was written locally (seconds since epoch).
    pub indexed_at: i64,
    /// Number of transactions stored for this block (after the per-block cap).
    pub tx_count: u32,
}

/// A normalized transaction row, keyed by `(chain, hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain: ChainId,
    pub hash: String,
    pub from: String,
    /// Empty when there is no recipient.
    pub to: String,
    /// Decimal string in the smallest denomination.
    pub value: String,
    pub block_height: u64,
    /// Position within the owning block.
    pub position: u32,
}

impl Transaction {
    /// Returns `true` if `address` is the sender or the recipient.
    pub fn touches(&self, address: &str) -> bool {
        self.from == address || (!self.to.is_empty() && self.to == address)
    }
}

/// A block together with its transactions, as served to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWithTransactions {
    #[serde(flatten)]
    pub block: Block,
    pub transactions: Vec<Transaction>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
