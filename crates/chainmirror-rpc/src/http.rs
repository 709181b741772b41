//! HTTP transports backed by `reqwest`: a JSON-RPC client for account chains
//! and a small REST client for indexer APIs such as Blockbook.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

fn build_http(url: &str, timeout: Duration) -> Result<reqwest::Client, TransportError> {
    let parsed = reqwest::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {:?}", parsed.scheme()),
        });
    }
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(TransportError::from)
}

fn request_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            ms: timeout.as_millis() as u64,
        }
    } else {
        e.into()
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status { status, body })
}

// ─── JSON-RPC ────────────────────────────────────────────────────────────────

/// HTTP JSON-RPC client. One attempt per request, bounded by the timeout.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpRpcClient {
    /// Create a client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let url = url.into();
        let http = build_http(&url, timeout)?;
        Ok(Self { url, http, timeout })
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(method = %req.method, id = %req.id, "rpc request");
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        check_status(resp)
            .await?
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| request_error(e, self.timeout))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

// ─── REST ────────────────────────────────────────────────────────────────────

/// GET-only JSON client rooted at a base URL, with an optional API key sent as
/// the `apikey` query parameter.
pub struct RestClient {
    base: String,
    api_key: Option<String>,
    http: reqwest::Client,
    timeout: Duration,
}

impl RestClient {
    pub fn new(
        base: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base = base.into().trim_end_matches('/').to_string();
        let http = build_http(&base, timeout)?;
        Ok(Self {
            base,
            api_key,
            http,
            timeout,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// GET `{base}{path}` and parse the body as JSON.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, TransportError> {
        let url = format!("{}{}", self.base, path);
        tracing::trace!(url = %url, "rest request");

        let mut req = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            req = req.query(&[("apikey", key)]);
        }
        let resp = req.send().await.map_err(|e| request_error(e, self.timeout))?;
        check_status(resp)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| request_error(e, self.timeout))
    }
}
