//! The single-writer event store.
//!
//! [`EventStore`] owns the message buffer and the sequence counter and runs
//! as one tokio task. Callers hold a [`StoreHandle`] and talk to it over two
//! mailboxes:
//!
//! ```text
//! bus adapter ──ingest()──► ingest_rx (bounded, awaits) ──┐
//!                                                         ├──► run() loop ──► buffer
//! HTTP callers ─query()/clear()/dump()──► request_rx ─────┘      (one request at a time)
//!               (bounded, try_send, reply via oneshot + timeout)
//! ```
//!
//! The loop selects fairly between the two mailboxes. Before serving a
//! request it drains the records already waiting in the ingest mailbox, so
//! every record whose `ingest()` call completed before the request was sent
//! is visible to that request. Requests whose caller has already given up
//! are skipped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::error::StoreError;
use crate::frequency::sorted_frequencies;
use crate::message::{IngestRecord, Message};
use crate::query::{accepts_spec, parse, Query};

/// Construction parameters for an [`EventStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of buffered messages.
    pub capacity: usize,
    /// Maximum number of messages returned by one query.
    pub max_results: usize,
    /// Number of query/clear/dump requests that may wait for the owner.
    pub request_queue: usize,
    /// Number of ingested records that may wait for the owner.
    pub ingest_queue: usize,
    /// How long a caller waits for the owner's reply.
    pub request_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: 100_000,
            max_results: 1000,
            request_queue: 64,
            ingest_queue: 1024,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Messages matching a query, plus buffer counters at the time it ran.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Matching messages. Oldest first for match-all queries, newest first
    /// otherwise.
    pub messages: Vec<Arc<Message>>,
    /// Number of messages ever ingested.
    pub total_received: i64,
    /// Number of messages currently buffered.
    pub buffered: usize,
}

impl QueryResult {
    /// Routing-key histogram of [`messages`](Self::messages), sorted by key.
    pub fn frequencies(&self) -> Vec<(String, usize)> {
        sorted_frequencies(self.messages.iter().map(Arc::as_ref))
    }
}

/// Buffer counters without any message payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of messages ever ingested.
    pub total_received: i64,
    /// Number of messages currently buffered.
    pub buffered: usize,
    /// Configured buffer capacity.
    pub capacity: usize,
}

enum Request {
    Query {
        query: Query,
        reply: oneshot::Sender<QueryResult>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    Dump {
        reply: oneshot::Sender<Vec<Arc<Message>>>,
    },
    Stats {
        reply: oneshot::Sender<StoreStats>,
    },
    Shutdown,
}

impl Request {
    /// Returns `true` once the caller has stopped waiting for the reply.
    fn is_abandoned(&self) -> bool {
        match self {
            Self::Query { reply, .. } => reply.is_closed(),
            Self::Clear { reply } => reply.is_closed(),
            Self::Dump { reply } => reply.is_closed(),
            Self::Stats { reply } => reply.is_closed(),
            Self::Shutdown => false,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Query { .. } => "Query",
            Self::Clear { .. } => "Clear",
            Self::Dump { .. } => "Dump",
            Self::Stats { .. } => "Stats",
            Self::Shutdown => "Shutdown",
        };
        f.write_str(kind)
    }
}

/// Owner of the message buffer and sequence counter.
pub struct EventStore {
    buffer: VecDeque<Arc<Message>>,
    next_seq: i64,
    capacity: usize,
    max_results: usize,
    ingest_queue: usize,
    ingest_rx: mpsc::Receiver<IngestRecord>,
    request_rx: mpsc::Receiver<Request>,
}

impl EventStore {
    /// Creates a store and its handle without starting the owner task.
    ///
    /// Call [`run`](Self::run) on a task of your choosing, or use
    /// [`spawn`](Self::spawn).
    #[must_use]
    pub fn new(config: StoreConfig) -> (Self, StoreHandle) {
        let (ingest_tx, ingest_rx) = mpsc::channel(config.ingest_queue.max(1));
        let (request_tx, request_rx) = mpsc::channel(config.request_queue.max(1));
        let store = Self {
            buffer: VecDeque::with_capacity(config.capacity.min(4096)),
            next_seq: 0,
            capacity: config.capacity,
            max_results: config.max_results,
            ingest_queue: config.ingest_queue.max(1),
            ingest_rx,
            request_rx,
        };
        let handle = StoreHandle {
            ingest_tx,
            request_tx,
            request_timeout: config.request_timeout,
        };
        (store, handle)
    }

    /// Creates a store and spawns its owner task on the current runtime.
    pub fn spawn(config: StoreConfig) -> StoreHandle {
        let (store, handle) = Self::new(config);
        tokio::spawn(store.run());
        handle
    }

    /// Serves requests until shut down or until every handle is dropped.
    pub async fn run(mut self) {
        info!(
            capacity = self.capacity,
            max_results = self.max_results,
            "event store started"
        );

        loop {
            tokio::select! {
                Some(record) = self.ingest_rx.recv() => self.ingest(record),
                request = self.request_rx.recv() => match request {
                    Some(Request::Shutdown) => {
                        info!("event store received shutdown");
                        break;
                    }
                    Some(request) => {
                        self.drain_ingest();
                        self.serve(request);
                    }
                    None => break,
                },
            }
        }

        info!(
            total_received = self.next_seq,
            buffered = self.buffer.len(),
            "event store stopped"
        );
    }

    /// Buffers the records already waiting in the ingest mailbox.
    ///
    /// The mailbox never holds more than `ingest_queue` records, so this
    /// covers everything sent before the current request and stops even
    /// while producers keep sending.
    fn drain_ingest(&mut self) {
        for _ in 0..self.ingest_queue {
            match self.ingest_rx.try_recv() {
                Ok(record) => self.ingest(record),
                Err(_) => break,
            }
        }
    }

    fn serve(&mut self, request: Request) {
        if request.is_abandoned() {
            debug!(?request, "skipping request abandoned by its caller");
            return;
        }

        match request {
            Request::Query { query, reply } => {
                let result = self.query(&query);
                debug!(
                    matched = result.messages.len(),
                    buffered = result.buffered,
                    "served query"
                );
                let _ = reply.send(result);
            }
            Request::Clear { reply } => {
                let dropped = self.buffer.len();
                self.buffer.clear();
                info!(dropped, next_seq = self.next_seq, "cleared message buffer");
                let _ = reply.send(());
            }
            Request::Dump { reply } => {
                let _ = reply.send(self.buffer.iter().cloned().collect());
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Request::Shutdown => {}
        }
    }

    fn ingest(&mut self, record: IngestRecord) {
        let seq = self.next_seq;
        self.next_seq += 1;
        trace!(seq, routing_key = %record.routing_key, "ingested message");

        self.buffer
            .push_back(Arc::new(Message::from_record(seq, Utc::now(), record)));
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    fn query(&self, query: &Query) -> QueryResult {
        let messages = match query {
            Query::All => {
                let take = self.buffer.len().min(self.max_results);
                self.buffer
                    .iter()
                    .skip(self.buffer.len() - take)
                    .cloned()
                    .collect()
            }
            Query::Filter(spec) => self
                .buffer
                .iter()
                .rev()
                .filter(|message| accepts_spec(message, spec))
                .take(self.max_results)
                .cloned()
                .collect(),
        };

        QueryResult {
            messages,
            total_received: self.next_seq,
            buffered: self.buffer.len(),
        }
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            total_received: self.next_seq,
            buffered: self.buffer.len(),
            capacity: self.capacity,
        }
    }
}

/// Cloneable handle to a running [`EventStore`].
#[derive(Clone, Debug)]
pub struct StoreHandle {
    ingest_tx: mpsc::Sender<IngestRecord>,
    request_tx: mpsc::Sender<Request>,
    request_timeout: Duration,
}

impl StoreHandle {
    /// Hands a record to the store without waiting for it to be buffered.
    ///
    /// Waits only while the ingest mailbox is full. If the store has
    /// stopped, the record is dropped.
    pub async fn ingest(&self, record: IngestRecord) {
        if let Err(err) = self.ingest_tx.send(record).await {
            warn!(
                routing_key = %err.0.routing_key,
                "event store stopped, dropping ingested record"
            );
        }
    }

    /// Parses `raw` and runs it against the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] for a malformed query, otherwise any of
    /// the request errors described on [`StoreError`].
    pub async fn query(&self, raw: &str) -> Result<QueryResult, StoreError> {
        let query = parse(raw)?;
        self.request(|reply| Request::Query { query, reply }).await
    }

    /// Empties the buffer. The sequence counter keeps counting.
    ///
    /// # Errors
    ///
    /// Returns `Overloaded`, `Timeout` or `Closed`.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.request(|reply| Request::Clear { reply }).await
    }

    /// Returns a copy of every buffered message, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Overloaded`, `Timeout` or `Closed`.
    pub async fn dump(&self) -> Result<Vec<Arc<Message>>, StoreError> {
        self.request(|reply| Request::Dump { reply }).await
    }

    /// Returns the buffer counters.
    ///
    /// # Errors
    ///
    /// Returns `Overloaded`, `Timeout` or `Closed`.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        self.request(|reply| Request::Stats { reply }).await
    }

    /// Asks the owner task to stop after the requests already queued.
    pub async fn shutdown(&self) {
        if self.request_tx.send(Request::Shutdown).await.is_err() {
            debug!("event store already stopped");
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Request,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .try_send(build(reply_tx))
            .map_err(|err| match err {
                TrySendError::Full(request) => {
                    warn!(?request, "event store request queue full");
                    StoreError::Overloaded
                }
                TrySendError::Closed(_) => StoreError::Closed,
            })?;

        match tokio::time::timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(StoreError::Closed),
            Err(_) => Err(StoreError::Timeout(self.request_timeout)),
        }
    }
}
