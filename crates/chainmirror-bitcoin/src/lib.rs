//! chainmirror-bitcoin — UTXO-chain adapter backed by a Blockbook instance.

pub mod adapter;
pub mod blockbook;

pub use adapter::{BlockbookAdapter, BlockbookApi};
