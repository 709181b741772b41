//! EVM JSON-RPC chain adapter.
//!
//! Heads come from `eth_blockNumber` (or `newHeads` over WebSocket when a WS
//! endpoint is configured), blocks from `eth_getBlockByNumber` /
//! `eth_getBlockByHash` with full transaction objects.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use chainmirror_core::normalize::normalize_value;
use chainmirror_core::{
    BlockRef, ChainAdapter, ChainId, ChainKind, HeadStream, IndexerError, RawBlock, RawTransaction,
};
use chainmirror_rpc::{parse_quantity, HttpRpcClient, RpcTransport, TransportError};

/// Account-chain adapter over any JSON-RPC transport.
pub struct EvmAdapter<T = HttpRpcClient> {
    chain: ChainId,
    transport: T,
    ws_url: Option<String>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl EvmAdapter<HttpRpcClient> {
    /// Adapter over HTTP JSON-RPC, with head pushes when `ws_url` is set.
    pub fn connect(
        chain: impl Into<ChainId>,
        rpc_url: &str,
        ws_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let transport = HttpRpcClient::new(rpc_url, timeout)?;
        Ok(Self::with_transport(chain, transport, timeout).with_ws(ws_url))
    }
}

impl<T: RpcTransport> EvmAdapter<T> {
    pub fn with_transport(chain: impl Into<ChainId>, transport: T, timeout: Duration) -> Self {
        Self {
            chain: chain.into(),
            transport,
            ws_url: None,
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Enable `newHeads` subscriptions through `ws_url`.
    pub fn with_ws(mut self, ws_url: Option<String>) -> Self {
        self.ws_url = ws_url;
        self
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.transport.call(id, method, params).await
    }
}

#[async_trait]
impl<T: RpcTransport> ChainAdapter for EvmAdapter<T> {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Account
    }

    async fn head_height(&self) -> Result<u64, IndexerError> {
        let head = self.call("eth_blockNumber", vec![]).await?;
        let head = head
            .as_str()
            .ok_or_else(|| IndexerError::Decode(format!("eth_blockNumber returned {head}")))?;
        Ok(parse_quantity(head)?)
    }

    async fn fetch_block(&self, at: &BlockRef) -> Result<Option<RawBlock>, IndexerError> {
        let block = match at {
            BlockRef::Height(h) => {
                self.call("eth_getBlockByNumber", vec![json!(format!("0x{h:x}")), json!(true)])
                    .await?
            }
            BlockRef::Hash(hash) => self.call("eth_getBlockByHash", vec![json!(hash), json!(true)]).await?,
        };
        if block.is_null() {
            return Ok(None);
        }
        block_from_json(&block).map(Some)
    }

    async fn subscribe_heads(&self) -> Result<Option<HeadStream>, IndexerError> {
        let Some(ws_url) = &self.ws_url else {
            return Ok(None);
        };
        tracing::debug!(chain = %self.chain, url = %ws_url, "opening newHeads subscription");
        let heads = chainmirror_rpc::ws::subscribe_new_heads(ws_url, self.timeout).await?;
        Ok(Some(Box::pin(heads.map(|h| h.map_err(IndexerError::from)))))
    }

    async fn balance(&self, address: &str) -> Result<String, IndexerError> {
        let balance = self.call("eth_getBalance", vec![json!(address), json!("latest")]).await?;
        let balance = balance
            .as_str()
            .ok_or_else(|| IndexerError::Decode(format!("eth_getBalance returned {balance}")))?;
        normalize_value(balance)
    }
}

fn field<'a>(v: &'a Value, key: &str) -> Result<&'a str, IndexerError> {
    v[key]
        .as_str()
        .ok_or_else(|| IndexerError::Decode(format!("block field {key} missing")))
}

fn quantity(v: &Value, key: &str) -> Result<u64, IndexerError> {
    Ok(parse_quantity(field(v, key)?)?)
}

/// Convert a full `eth_getBlockBy*` result into a [`RawBlock`].
///
/// Transactions must be objects (the `true` flag); a block returned with hash
/// lists is a decode error.
pub fn block_from_json(v: &Value) -> Result<RawBlock, IndexerError> {
    let transactions = match v["transactions"].as_array() {
        Some(txs) => txs.iter().map(tx_from_json).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(RawBlock {
        height: quantity(v, "number")?,
        hash: field(v, "hash")?.to_string(),
        parent_hash: field(v, "parentHash")?.to_string(),
        timestamp: quantity(v, "timestamp")? as i64,
        transactions,
    })
}

fn tx_from_json(v: &Value) -> Result<RawTransaction, IndexerError> {
    if !v.is_object() {
        return Err(IndexerError::Decode(
            "block transactions are hashes, expected full objects".into(),
        ));
    }
    let opt = |key: &str| v[key].as_str().filter(|s| !s.is_empty()).map(str::to_string);
    Ok(RawTransaction {
        hash: field(v, "hash")?.to_string(),
        from: opt("from"),
        to: opt("to"),
        value: opt("value").unwrap_or_else(|| "0x0".into()),
    })
}
