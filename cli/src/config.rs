//! YAML configuration for the `chainmirror` binary.
//!
//! ```yaml
//! database_url: "sqlite:./chainmirror.db"
//! log:
//!   level: info
//! chains:
//!   - id: eth
//!     kind: account
//!     rpc_url: https://eth.example/rpc
//!     ws_url: wss://eth.example/ws
//!     sync:
//!       backfill_depth: 20
//!   - id: btc
//!     kind: utxo
//!     rpc_url: https://btc.example/api/v2
//!     api_key_env: BLOCKBOOK_API_KEY
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use chainmirror_bitcoin::BlockbookAdapter;
use chainmirror_core::{ChainAdapter, ChainKind, SyncConfig};
use chainmirror_evm::EvmAdapter;

use crate::logging::LogConfig;

fn default_database_url() -> String {
    "sqlite:./chainmirror.db".into()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log: LogConfig::default(),
            chains: Vec::new(),
        }
    }
}

/// One mirrored chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain tag stored on every record (`eth`, `btc`, ...).
    pub id: String,
    pub kind: ChainKind,
    /// JSON-RPC endpoint (account chains) or Blockbook API root (UTXO chains).
    pub rpc_url: String,
    /// WebSocket endpoint for head pushes. Account chains only.
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Environment variable holding the API key, if the endpoint needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn api_key(&self) -> Result<Option<String>> {
        match &self.api_key_env {
            Some(var) => std::env::var(var)
                .map(Some)
                .with_context(|| format!("chain '{}': environment variable {var} is not set", self.id)),
            None => Ok(None),
        }
    }

    /// Build the adapter for this chain.
    pub fn adapter(&self) -> Result<Arc<dyn ChainAdapter>> {
        let adapter: Arc<dyn ChainAdapter> = match self.kind {
            ChainKind::Account => Arc::new(EvmAdapter::connect(
                self.id.as_str(),
                &self.rpc_url,
                self.ws_url.clone(),
                self.request_timeout(),
            )?),
            ChainKind::Utxo => Arc::new(
                BlockbookAdapter::connect(
                    self.id.as_str(),
                    &self.rpc_url,
                    self.api_key()?,
                    self.request_timeout(),
                )?
                .with_max_transactions(self.sync.max_transactions_per_block),
            ),
        };
        Ok(adapter)
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("parsing YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chain in &self.chains {
            if chain.id.trim().is_empty() {
                bail!("chain id must not be empty");
            }
            if !seen.insert(chain.id.as_str()) {
                bail!("chain '{}' is configured twice", chain.id);
            }
            if chain.rpc_url.trim().is_empty() {
                bail!("chain '{}': rpc_url is empty", chain.id);
            }
            if chain.ws_url.is_some() && chain.kind == ChainKind::Utxo {
                bail!("chain '{}': ws_url is only supported for account chains", chain.id);
            }
            if chain.sync.max_transactions_per_block == 0 {
                bail!("chain '{}': max_transactions_per_block must be at least 1", chain.id);
            }
        }
        Ok(())
    }

    pub fn chain(&self, id: &str) -> Result<&ChainConfig> {
        self.chains
            .iter()
            .find(|c| c.id == id)
            .with_context(|| format!("chain '{id}' is not configured"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
database_url: "sqlite::memory:"
log:
  level: debug
  json: true
chains:
  - id: eth
    kind: account
    rpc_url: https://eth.example/rpc
    ws_url: wss://eth.example/ws
    sync:
      backfill_depth: 5
      poll_interval_ms: 12000
  - id: btc
    kind: utxo
    rpc_url: https://btc.example/api/v2
    request_timeout_ms: 3000
"#;

    #[test]
    fn parses_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert!(config.log.json);

        let eth = config.chain("eth").unwrap();
        assert_eq!(eth.kind, ChainKind::Account);
        let sync = &eth.sync;
        assert_eq!(sync.backfill_depth, 5);
        assert_eq!(sync.poll_interval_ms, 12_000);
        // untouched fields keep their defaults
        assert_eq!(sync.max_transactions_per_block, 100);
        assert_eq!(eth.request_timeout(), Duration::from_secs(10));

        let btc = config.chain("btc").unwrap();
        assert_eq!(btc.sync, SyncConfig::default());
        assert_eq!(btc.request_timeout_ms, 3_000);
    }

    #[test]
    fn defaults_when_empty() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.database_url, "sqlite:./chainmirror.db");
        assert!(config.chains.is_empty());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn rejects_duplicate_chain() {
        let raw = r#"
chains:
  - { id: eth, kind: account, rpc_url: "http://a" }
  - { id: eth, kind: account, rpc_url: "http://b" }
"#;
        let err = AppConfig::from_yaml(raw).unwrap_err();
        assert!(err.to_string().contains("configured twice"));
    }

    #[test]
    fn rejects_ws_on_utxo_chain() {
        let raw = r#"
chains:
  - { id: btc, kind: utxo, rpc_url: "http://a", ws_url: "ws://b" }
"#;
        assert!(AppConfig::from_yaml(raw).is_err());
    }

    #[test]
    fn unknown_chain_lookup_fails() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        assert!(config.chain("sol").is_err());
    }

    #[test]
    fn missing_api_key_variable_is_an_error() {
        let raw = r#"
chains:
  - id: btc
    kind: utxo
    rpc_url: https://btc.example/api/v2
    api_key_env: CHAINMIRROR_TEST_KEY_THAT_IS_NEVER_SET
"#;
        let config = AppConfig::from_yaml(raw).unwrap();
        let err = config.chains[0].adapter().err().unwrap();
        assert!(err.to_string().contains("CHAINMIRROR_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn builds_adapters() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        let eth = config.chain("eth").unwrap().adapter().unwrap();
        assert_eq!(eth.kind(), ChainKind::Account);
        let btc = config.chain("btc").unwrap().adapter().unwrap();
        assert_eq!(btc.chain().as_str(), "btc");
    }
}
