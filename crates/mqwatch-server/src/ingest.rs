//! Bus ingestion adapter.
//!
//! Turns raw bus deliveries into [`IngestRecord`]s: ignored routing keys are
//! dropped, bodies must be JSON and are re-serialised compactly. Anything
//! that fails here never reaches the event store.

use crate::config::IngestSettings;
use mqwatch_store::{IngestRecord, StoreHandle};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// A message as handed over by a bus transport.
#[derive(Debug, Clone, Default)]
pub struct Delivery {
    /// Routing key the message was published with.
    pub routing_key: String,
    /// Raw payload bytes.
    pub body: Vec<u8>,
    /// Transport headers.
    pub headers: Map<String, Value>,
    /// Publisher identity, if the transport knows it.
    pub sender: String,
}

/// Reasons a delivery is not buffered.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The routing key is on the ignore list.
    #[error("routing key {0} is ignored")]
    IgnoredKey(String),

    /// The body is not valid JSON.
    #[error("could not decode message body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Decodes a delivery into a record the store accepts.
///
/// # Errors
///
/// Returns `IngestError::IgnoredKey` for ignored routing keys and
/// `IngestError::Decode` for bodies that are not JSON.
pub fn decode_delivery(
    ignore_keys: &HashSet<String>,
    delivery: Delivery,
) -> Result<IngestRecord, IngestError> {
    if ignore_keys.contains(&delivery.routing_key) {
        return Err(IngestError::IgnoredKey(delivery.routing_key));
    }

    let value: Value = serde_json::from_slice(&delivery.body)?;
    let body = serde_json::to_vec(&value)?;

    Ok(IngestRecord {
        body,
        routing_key: delivery.routing_key,
        headers: delivery.headers,
        sender: delivery.sender,
    })
}

/// Feeds decoded deliveries into the event store.
#[derive(Clone, Debug)]
pub struct Ingestor {
    store: StoreHandle,
    ignore_keys: Arc<HashSet<String>>,
}

impl Ingestor {
    pub fn new(store: StoreHandle, settings: &IngestSettings) -> Self {
        Self {
            store,
            ignore_keys: Arc::new(settings.ignore_keys.iter().cloned().collect()),
        }
    }

    /// Decodes `delivery` and hands it to the store.
    ///
    /// Returns `false` if the delivery was dropped. Decode failures are
    /// logged; ignored keys are dropped silently.
    pub async fn accept(&self, delivery: Delivery) -> bool {
        match decode_delivery(&self.ignore_keys, delivery) {
            Ok(record) => {
                self.store.ingest(record).await;
                true
            }
            Err(IngestError::IgnoredKey(key)) => {
                tracing::trace!(routing_key = %key, "dropping ignored routing key");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable message");
                false
            }
        }
    }
}
