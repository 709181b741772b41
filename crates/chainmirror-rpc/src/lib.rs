//! chainmirror-rpc — transports used by the chain adapters.
//!
//! - [`HttpRpcClient`]: JSON-RPC 2.0 over HTTP
//! - [`RestClient`]: JSON GET requests against REST indexers
//! - [`ws::subscribe_new_heads`]: `newHeads` over WebSocket
//!
//! Transports never retry. [`TransportError`] converts into the sync loop's
//! `IndexerError`, which decides between backing off and stopping.

pub mod error;
pub mod http;
pub mod request;
pub mod transport;
pub mod ws;

pub use error::TransportError;
pub use http::{HttpRpcClient, RestClient};
pub use request::{parse_quantity, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::RpcTransport;
