//! chainmirror-evm — account-chain adapter speaking Ethereum JSON-RPC.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use chainmirror_evm::EvmAdapter;
//!
//! let adapter = EvmAdapter::connect(
//!     "eth",
//!     "https://eth.example/rpc",
//!     Some("wss://eth.example/ws".into()),
//!     Duration::from_secs(10),
//! )?;
//! # Ok::<(), chainmirror_core::IndexerError>(())
//! ```

pub mod adapter;

pub use adapter::{block_from_json, EvmAdapter};
