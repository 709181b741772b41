//! chainmirror-core — foundation for mirroring several blockchains into one store.
//!
//! # Architecture
//!
//! ```text
//! ChainMirror → SyncScheduler (one task per chain)
//!                   ├── ChainAdapter    (head, blocks, optional head stream)
//!                   ├── IngestPipeline  (fetch → normalize → linkage check → commit)
//!                   │     └── ReorgResolver (walk back to common ancestor, roll back)
//!                   └── ChainStore      (atomic block + transactions + cursor)
//! ```
//!
//! Readers go through [`QueryStore`], never through the sync loops.

pub mod adapter;
pub mod backoff;
pub mod builder;
pub mod config;
pub mod cursor;
pub mod error;
pub mod memory;
pub mod normalize;
pub mod pipeline;
pub mod reorg;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod types;

pub use adapter::{ChainAdapter, HeadStream};
pub use backoff::{Backoff, BackoffConfig};
pub use builder::SyncConfigBuilder;
pub use config::SyncConfig;
pub use cursor::Cursor;
pub use error::IndexerError;
pub use memory::MemoryStore;
pub use pipeline::{CommitSummary, IngestOutcome, IngestPipeline};
pub use reorg::{Linkage, ReorgEvent, ReorgResolver};
pub use scheduler::{ChainStatus, SyncScheduler, SyncState};
pub use store::{BlockCommit, ChainStore, QueryStore};
pub use supervisor::{ChainMirror, ChainReport, RunningMirror, ShutdownHandle};
pub use types::{
    Block, BlockRef, BlockWithTransactions, ChainId, ChainKind, RawBlock, RawTransaction,
    Transaction, COINBASE_SENDER,
};
