//! Error types for the mirroring pipeline.

use thiserror::Error;

use crate::types::ChainId;

/// Errors that can occur while mirroring a chain.
///
/// "Block not yet available" is deliberately absent: adapters report it as
/// `Ok(None)` and the pipeline as [`IngestOutcome::NotYetAvailable`].
///
/// [`IngestOutcome::NotYetAvailable`]: crate::pipeline::IngestOutcome::NotYetAvailable
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Timeout, connection failure, 5xx, rate limiting. Retried with backoff.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Bad credentials, wrong endpoint, unsupported method. Needs an operator.
    #[error("Fatal configuration error: {0}")]
    FatalConfig(String),

    #[error(
        "Unresolvable reorg on {chain} at block {height}: no common ancestor within {max_depth} blocks"
    )]
    UnresolvableReorg {
        chain: ChainId,
        height: u64,
        max_depth: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    /// The adapter returned data that cannot be mirrored faithfully.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Indexer aborted: {reason}")]
    Aborted { reason: String },

    #[error("Shutdown requested")]
    Shutdown,
}

impl IndexerError {
    /// Returns `true` if the scheduler should back off and retry the same step.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_) | Self::Storage(_))
    }

    /// Returns `true` if the chain's sync loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FatalConfig(_)
                | Self::UnresolvableReorg { .. }
                | Self::Decode(_)
                | Self::Aborted { .. }
        )
    }

    /// Returns `true` if this is an unresolvable reorg.
    pub fn is_reorg(&self) -> bool {
        matches!(self, Self::UnresolvableReorg { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(IndexerError::TransientNetwork("timeout".into()).is_retryable());
        assert!(IndexerError::Storage("locked".into()).is_retryable());
        assert!(IndexerError::FatalConfig("401".into()).is_fatal());
        assert!(IndexerError::Decode("bad value".into()).is_fatal());

        let reorg = IndexerError::UnresolvableReorg {
            chain: "eth".into(),
            height: 100,
            max_depth: 64,
        };
        assert!(reorg.is_fatal());
        assert!(reorg.is_reorg());
        assert!(!reorg.is_retryable());

        assert!(!IndexerError::Shutdown.is_fatal());
        assert!(!IndexerError::Shutdown.is_retryable());
    }

    #[test]
    fn display_mentions_chain_and_depth() {
        let err = IndexerError::UnresolvableReorg {
            chain: "btc".into(),
            height: 812_000,
            max_depth: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains("btc"));
        assert!(msg.contains("812000"));
        assert!(msg.contains('6'));
    }
}
