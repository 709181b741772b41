//! UTXO-chain adapter over the Blockbook REST API.
//!
//! Blockbook has no push channel the mirror can use, so this adapter is
//! poll-only. Large blocks are paged; pages are followed only until the
//! per-block transaction cap is covered.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use chainmirror_core::normalize::normalize_value;
use chainmirror_core::{BlockRef, ChainAdapter, ChainId, ChainKind, IndexerError, RawBlock};
use chainmirror_rpc::{RestClient, TransportError};

use crate::blockbook::{AddressInfo, BlockPage, Status};

/// GET access to a Blockbook instance.
#[async_trait]
pub trait BlockbookApi: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError>;
}

#[async_trait]
impl BlockbookApi for RestClient {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        RestClient::get(self, path, query).await
    }
}

fn decode<T: DeserializeOwned>(what: &str, v: Value) -> Result<T, IndexerError> {
    serde_json::from_value(v).map_err(|e| IndexerError::Decode(format!("blockbook {what}: {e}")))
}

/// Poll-only UTXO-chain adapter.
pub struct BlockbookAdapter<A = RestClient> {
    chain: ChainId,
    api: A,
    /// Stop paging once this many transactions are collected.
    max_transactions: usize,
}

impl BlockbookAdapter<RestClient> {
    /// Adapter for the Blockbook API rooted at `base_url` (e.g. `https://host/api/v2`).
    pub fn connect(
        chain: impl Into<ChainId>,
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let api = RestClient::new(base_url, api_key, timeout)?;
        Ok(Self::with_api(chain, api))
    }
}

impl<A: BlockbookApi> BlockbookAdapter<A> {
    pub fn with_api(chain: impl Into<ChainId>, api: A) -> Self {
        Self {
            chain: chain.into(),
            api,
            max_transactions: usize::MAX,
        }
    }

    /// Only page through a block until `max` transactions are collected.
    pub fn with_max_transactions(mut self, max: usize) -> Self {
        self.max_transactions = max;
        self
    }

    async fn page(&self, at: &BlockRef, page: u32) -> Result<Option<BlockPage>, IndexerError> {
        match self.api.get(&format!("/block/{at}"), &[("page", page.to_string())]).await {
            Ok(v) => decode("block", v).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<A: BlockbookApi> ChainAdapter for BlockbookAdapter<A> {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Utxo
    }

    async fn head_height(&self) -> Result<u64, IndexerError> {
        let status: Status = decode("status", self.api.get("", &[]).await?)?;
        Ok(status.blockbook.best_height)
    }

    async fn fetch_block(&self, at: &BlockRef) -> Result<Option<RawBlock>, IndexerError> {
        let Some(first) = self.page(at, 1).await? else {
            return Ok(None);
        };
        let total_pages = first.total_pages;
        let mut block = RawBlock {
            height: first.height,
            hash: first.hash,
            parent_hash: first.previous_block_hash.unwrap_or_default(),
            timestamp: first.time,
            transactions: first.txs.into_iter().map(|tx| tx.into_raw()).collect(),
        };

        // later pages are addressed by hash so they cannot come from another block
        let by_hash = BlockRef::Hash(block.hash.clone());
        let mut page = 1;
        while page < total_pages && block.transactions.len() < self.max_transactions {
            page += 1;
            let Some(next) = self.page(&by_hash, page).await? else {
                return Err(IndexerError::TransientNetwork(format!(
                    "block {} disappeared while reading page {page}",
                    block.hash
                )));
            };
            block.transactions.extend(next.txs.into_iter().map(|tx| tx.into_raw()));
        }

        tracing::trace!(
            chain = %self.chain,
            height = block.height,
            pages = page,
            total_pages,
            txs = block.transactions.len(),
            "fetched block"
        );
        Ok(Some(block))
    }

    async fn balance(&self, address: &str) -> Result<String, IndexerError> {
        let info: AddressInfo = decode(
            "address",
            self.api
                .get(&format!("/address/{address}"), &[("details", "basic".to_string())])
                .await?,
        )?;
        normalize_value(&info.balance)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    /// Serves canned bodies keyed by `path?query`.
    #[derive(Default)]
    struct CannedBlockbook {
        bodies: HashMap<String, Result<Value, (u16, String)>>,
        requests: Mutex<Vec<String>>,
    }

    impl CannedBlockbook {
        fn body(mut self, key: &str, v: Value) -> Self {
            self.bodies.insert(key.into(), Ok(v));
            self
        }

        fn status(mut self, key: &str, status: u16, body: &str) -> Self {
            self.bodies.insert(key.into(), Err((status, body.into())));
            self
        }
    }

    #[async_trait]
    impl BlockbookApi for CannedBlockbook {
        async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
            let query: Vec<_> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            let key = if query.is_empty() {
                path.to_string()
            } else {
                format!("{path}?{}", query.join("&"))
            };
            self.requests.lock().unwrap().push(key.clone());
            match self.bodies.get(&key) {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err((status, body))) => Err(TransportError::Status {
                    status: *status,
                    body: body.clone(),
                }),
                None => Err(TransportError::Status {
                    status: 404,
                    body: "Not Found".into(),
                }),
            }
        }
    }

    fn tx(id: &str) -> Value {
        json!({
            "txid": id,
            "vin": [{"addresses": ["bc1qfrom"], "isAddress": true}],
            "vout": [{"value": "1000", "addresses": ["bc1qto"], "isAddress": true}]
        })
    }

    fn page(page: u32, total: u32, txs: &[&str]) -> Value {
        json!({
            "page": page,
            "totalPages": total,
            "hash": "00000000000000000002a7c4",
            "previousBlockHash": "00000000000000000001f3e2",
            "height": 820000,
            "time": 1_703_000_000,
            "txs": txs.iter().map(|id| tx(id)).collect::<Vec<_>>()
        })
    }

    #[tokio::test]
    async fn head_from_status() {
        let api = CannedBlockbook::default()
            .body("", json!({"blockbook": {"coin": "Bitcoin", "bestHeight": 820001}, "backend": {}}));
        let adapter = BlockbookAdapter::with_api("btc", api);
        assert_eq!(adapter.head_height().await.unwrap(), 820_001);
        assert_eq!(adapter.kind(), ChainKind::Utxo);
    }

    #[tokio::test]
    async fn block_pages_are_followed_up_to_the_cap() {
        let hash = "/block/00000000000000000002a7c4";
        let api = CannedBlockbook::default()
            .body("/block/820000?page=1", page(1, 3, &["a", "b"]))
            .body(&format!("{hash}?page=2"), page(2, 3, &["c", "d"]))
            .body(&format!("{hash}?page=3"), page(3, 3, &["e", "f"]));
        let adapter = BlockbookAdapter::with_api("btc", api).with_max_transactions(3);

        let block = adapter.fetch_block(&BlockRef::Height(820_000)).await.unwrap().unwrap();

        assert_eq!(block.transactions.len(), 4);
        assert_eq!(block.parent_hash, "00000000000000000001f3e2");
        assert_eq!(block.transactions[3].hash, "d");
        assert_eq!(adapter.api.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn block_not_found_is_none() {
        let api = CannedBlockbook::default().status(
            "/block/999999999?page=1",
            400,
            r#"{"error":"Block not found, Block height out of range"}"#,
        );
        let adapter = BlockbookAdapter::with_api("btc", api);
        assert!(adapter.fetch_block(&BlockRef::Height(999_999_999)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_api_key_is_fatal() {
        let api = CannedBlockbook::default().status("", 403, "invalid api key");
        let adapter = BlockbookAdapter::with_api("btc", api);
        assert!(matches!(adapter.head_height().await, Err(IndexerError::FatalConfig(_))));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let api = CannedBlockbook::default().status("/block/5?page=1", 502, "bad gateway");
        let adapter = BlockbookAdapter::with_api("btc", api);
        assert!(adapter.fetch_block(&BlockRef::Height(5)).await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn balance_from_address_details() {
        let api = CannedBlockbook::default().body(
            "/address/bc1qxyz?details=basic",
            json!({"address": "bc1qxyz", "balance": "4200000000", "txs": 12}),
        );
        let adapter = BlockbookAdapter::with_api("btc", api);
        assert_eq!(adapter.balance("bc1qxyz").await.unwrap(), "4200000000");
    }

    #[tokio::test]
    async fn poll_only() {
        let adapter = BlockbookAdapter::with_api("btc", CannedBlockbook::default());
        assert!(adapter.subscribe_heads().await.unwrap().is_none());
    }
}
