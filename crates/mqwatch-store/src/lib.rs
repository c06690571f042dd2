//! In-memory event store and query engine for mqwatch.
//!
//! Holds a bounded, sequence-numbered buffer of messages observed on a
//! message bus, and answers ad-hoc filter queries against it. All buffer
//! state is owned by a single tokio task (the [`EventStore`]); every other
//! part of the process talks to it through a cloneable [`StoreHandle`].
//!
//! # Query language
//!
//! A raw query is split into clause groups on newline or comma. Groups are
//! OR-combined; the whitespace-separated tokens inside one group are
//! AND-combined:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `key:<value>` | routing key must equal `<value>` exactly |
//! | `#<M>-<N>`, `#<M>-`, `#-<N>` | sequence number within the inclusive range |
//! | anything else | body must contain the token as a substring |
//!
//! An empty query, or exactly `*`, returns the most recent messages without
//! any filtering.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mqwatch_store::{EventStore, IngestRecord, StoreConfig};
//!
//! let store = EventStore::spawn(StoreConfig::default());
//! store.ingest(IngestRecord::new("orders.created", br#"{"id":1}"#.to_vec())).await;
//!
//! let result = store.query("key:orders.created").await?;
//! assert_eq!(result.messages.len(), 1);
//! ```

mod error;
mod frequency;
mod message;
mod query;
mod store;

pub use error::{QueryError, StoreError};
pub use frequency::{frequencies, normalize_routing_key, sorted_frequencies, UUID_PLACEHOLDER};
pub use message::{IngestRecord, Message};
pub use query::{
    accepts_clause, accepts_spec, parse, Clause, KeyFilter, Query, QuerySpec, Token,
    MATCH_ALL,
};
pub use store::{EventStore, QueryResult, StoreConfig, StoreHandle, StoreStats};
