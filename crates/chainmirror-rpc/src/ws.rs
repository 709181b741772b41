//! WebSocket `eth_subscribe("newHeads")` stream.
//!
//! Each call opens its own connection and subscribes once. The returned
//! stream yields head heights until the connection drops, then ends; callers
//! re-subscribe with a fresh call.

use std::pin::Pin;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::request::{parse_quantity, JsonRpcRequest, JsonRpcResponse, RpcId};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Stream of new head heights.
pub type NewHeads = Pin<Box<dyn Stream<Item = Result<u64, TransportError>> + Send>>;

const SUBSCRIBE_ID: u64 = 1;

struct Subscription {
    // kept so the write half outlives the stream
    _sink: SplitSink<Socket, Message>,
    stream: SplitStream<Socket>,
    id: String,
}

/// Connect to `url` and subscribe to new heads.
pub async fn subscribe_new_heads(url: &str, timeout: Duration) -> Result<NewHeads, TransportError> {
    let timed_out = || TransportError::Timeout {
        ms: timeout.as_millis() as u64,
    };

    let (socket, _) = tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url))
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| match e {
            tokio_tungstenite::tungstenite::Error::Url(reason) => TransportError::InvalidUrl {
                url: url.to_string(),
                reason: reason.to_string(),
            },
            other => TransportError::WebSocket(other.to_string()),
        })?;
    let (mut sink, mut stream) = socket.split();

    let req = JsonRpcRequest::new(SUBSCRIBE_ID, "eth_subscribe", vec![Value::String("newHeads".into())]);
    sink.send(Message::Text(serde_json::to_string(&req)?.into()))
        .await
        .map_err(|e| TransportError::WebSocket(e.to_string()))?;

    let id = tokio::time::timeout(timeout, await_subscription_id(&mut stream))
        .await
        .map_err(|_| timed_out())??;
    tracing::debug!(url = %url, subscription = %id, "newHeads subscription established");

    let state = Some(Subscription {
        _sink: sink,
        stream,
        id,
    });
    let heads = futures::stream::unfold(state, |state| async move {
        let mut sub = state?;
        loop {
            match sub.stream.next().await {
                Some(Ok(Message::Text(text))) => match head_from_notification(text.as_str(), &sub.id) {
                    Some(Ok(height)) => return Some((Ok(height), Some(sub))),
                    Some(Err(e)) => return Some((Err(e), None)),
                    None => continue,
                },
                Some(Ok(Message::Close(_))) | None => return None,
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some((Err(TransportError::WebSocket(e.to_string())), None)),
            }
        }
    });
    Ok(Box::pin(heads))
}

/// Read messages until the response to the subscribe request arrives.
async fn await_subscription_id(stream: &mut SplitStream<Socket>) -> Result<String, TransportError> {
    while let Some(msg) = stream.next().await {
        let text = match msg.map_err(|e| TransportError::WebSocket(e.to_string()))? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(resp) = serde_json::from_str::<JsonRpcResponse>(text.as_str()) else {
            continue;
        };
        if resp.id != RpcId::Number(SUBSCRIBE_ID) {
            continue;
        }
        return match resp.into_result().map_err(TransportError::Rpc)? {
            Value::String(id) => Ok(id),
            other => Err(TransportError::Malformed(format!("subscription id {other}"))),
        };
    }
    Err(TransportError::WebSocket("connection closed before subscribing".into()))
}

/// Extract the head height from an `eth_subscription` notification for `id`.
/// Returns `None` for messages that are not such a notification.
fn head_from_notification(text: &str, id: &str) -> Option<Result<u64, TransportError>> {
    let val = serde_json::from_str::<Value>(text).ok()?;
    if val.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
        return None;
    }
    let params = val.get("params")?;
    if params.get("subscription").and_then(|s| s.as_str()) != Some(id) {
        return None;
    }
    Some(match params["result"]["number"].as_str() {
        Some(number) => parse_quantity(number),
        None => Err(TransportError::Malformed("newHeads notification without number".into())),
    })
}
