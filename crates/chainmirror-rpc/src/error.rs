//! Transport-level error types and their mapping onto sync errors.

use chainmirror_core::IndexerError;
use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur during a transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, reset, DNS failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// WebSocket connect/send/receive error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The endpoint URL cannot be used.
    #[error("Invalid endpoint URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns `true` if this error is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::WebSocket(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::Rpc(err) => err.code != JsonRpcError::METHOD_NOT_FOUND,
            Self::InvalidUrl { .. } | Self::Malformed(_) | Self::Deserialization(_) => false,
        }
    }

    /// Returns `true` for a 404 (or 400) whose body says the item does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Status { status, body } => {
                matches!(status, 400 | 404) && body.to_ascii_lowercase().contains("not found")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Self::InvalidUrl {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                reason: e.to_string(),
            }
        } else if e.is_decode() {
            Self::Malformed(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

/// Retryable transport failures become `TransientNetwork`; bad responses
/// become `Decode`; everything else points at the configuration.
impl From<TransportError> for IndexerError {
    fn from(e: TransportError) -> Self {
        match &e {
            TransportError::Malformed(_) | TransportError::Deserialization(_) => {
                IndexerError::Decode(e.to_string())
            }
            _ if e.is_retryable() => IndexerError::TransientNetwork(e.to_string()),
            _ => IndexerError::FatalConfig(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> TransportError {
        TransportError::Status {
            status,
            body: body.into(),
        }
    }

    #[test]
    fn status_classification() {
        assert!(status(503, "").is_retryable());
        assert!(status(429, "slow down").is_retryable());
        assert!(!status(401, "invalid api key").is_retryable());
        assert!(!status(404, "").is_retryable());
    }

    #[test]
    fn not_found_needs_the_message() {
        assert!(status(400, "{\"error\":\"Block not found\"}").is_not_found());
        assert!(status(404, "Not Found").is_not_found());
        assert!(!status(404, "").is_not_found());
        assert!(!status(500, "not found").is_not_found());
    }

    #[test]
    fn maps_onto_indexer_errors() {
        let e: IndexerError = TransportError::Timeout { ms: 10_000 }.into();
        assert!(e.is_retryable());

        let e: IndexerError = status(403, "forbidden").into();
        assert!(matches!(e, IndexerError::FatalConfig(_)));

        let e: IndexerError = TransportError::Rpc(JsonRpcError {
            code: JsonRpcError::METHOD_NOT_FOUND,
            message: "method not found".into(),
            data: None,
        })
        .into();
        assert!(matches!(e, IndexerError::FatalConfig(_)));

        let e: IndexerError = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "header not found".into(),
            data: None,
        })
        .into();
        assert!(e.is_retryable());

        let e: IndexerError = TransportError::Malformed("no hash".into()).into();
        assert!(matches!(e, IndexerError::Decode(_)));
    }
}
