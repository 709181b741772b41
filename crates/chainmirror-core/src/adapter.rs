//! The `ChainAdapter` capability — one implementation per chain family.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::IndexerError;
use crate::types::{BlockRef, ChainId, ChainKind, RawBlock};

/// Stream of newly observed head heights.
///
/// Delivery is at-least-once and may skip heights; only the newest head is
/// guaranteed to be signaled eventually. The stream ends when the underlying
/// connection drops; callers re-subscribe.
pub type HeadStream = Pin<Box<dyn Stream<Item = Result<u64, IndexerError>> + Send>>;

/// Read access to one remote chain.
///
/// Adapters hold a connection handle and nothing else. They never retry:
/// every retry decision belongs to the sync scheduler.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// The chain tag stamped on every record produced from this adapter.
    fn chain(&self) -> &ChainId;

    fn kind(&self) -> ChainKind;

    /// Current head height of the remote chain.
    async fn head_height(&self) -> Result<u64, IndexerError>;

    /// Fetch a block with its transactions.
    ///
    /// `Ok(None)` means the block does not exist (yet); callers try later.
    async fn fetch_block(&self, at: &BlockRef) -> Result<Option<RawBlock>, IndexerError>;

    /// Subscribe to new head heights. `Ok(None)` means the adapter is poll-only.
    async fn subscribe_heads(&self) -> Result<Option<HeadStream>, IndexerError> {
        Ok(None)
    }

    /// Balance of `address` in the smallest denomination, as a decimal string.
    ///
    /// Balances are not derived from indexed data; they are read through.
    async fn balance(&self, address: &str) -> Result<String, IndexerError>;
}
