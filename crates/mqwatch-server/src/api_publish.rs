//! HTTP bridge for bus deliveries.
//!
//! `POST /api/publish/{routing_key}` carries one bus message: the request
//! body is the payload, `X-Mqwatch-Sender` names the publisher and every
//! `X-Mqwatch-Header-<name>` header becomes a message header `<name>`.

use crate::ingest::Delivery;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Request header naming the publisher.
pub const SENDER_HEADER: &str = "x-mqwatch-sender";

/// Prefix of request headers forwarded as message headers.
pub const MESSAGE_HEADER_PREFIX: &str = "x-mqwatch-header-";

/// Builds a [`Delivery`] from an HTTP request.
pub fn delivery_from_request(routing_key: String, headers: &HeaderMap, body: Bytes) -> Delivery {
    let sender = headers
        .get(SENDER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut message_headers = Map::new();
    for (name, value) in headers {
        let Some(short) = name.as_str().strip_prefix(MESSAGE_HEADER_PREFIX) else {
            continue;
        };
        match value.to_str() {
            Ok(text) => {
                message_headers.insert(short.to_string(), Value::String(text.to_string()));
            }
            Err(_) => {
                tracing::debug!(header = %name, "skipping non-ASCII message header");
            }
        }
    }

    Delivery {
        routing_key,
        body: body.to_vec(),
        headers: message_headers,
        sender,
    }
}

/// Handler for `POST /api/publish/{routing_key}`.
///
/// Always answers `202 Accepted`: ingestion is fire-and-forget, and bodies
/// that fail to decode are logged and dropped by the ingestor.
pub async fn publish_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(routing_key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let delivery = delivery_from_request(routing_key, &headers, body);
    state.ingestor.accept(delivery).await;
    StatusCode::ACCEPTED
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefixed_headers_become_message_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(SENDER_HEADER, HeaderValue::from_static("billing"));
        headers.insert(
            "x-mqwatch-header-__classname__",
            HeaderValue::from_static("OrderCreated"),
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let delivery =
            delivery_from_request("orders".into(), &headers, Bytes::from_static(b"{}"));
        assert_eq!(delivery.sender, "billing");
        assert_eq!(delivery.headers.len(), 1);
        assert_eq!(delivery.headers["__classname__"], "OrderCreated");
        assert_eq!(delivery.body, b"{}");
    }
}
