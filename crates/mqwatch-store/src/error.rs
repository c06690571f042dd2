//! Error types for the event store and query parser.

/// Errors produced while parsing a raw query string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// A `#M-N` token carried a bound that is not a non-negative integer.
    #[error("invalid sequence range `{token}`: bounds must be non-negative integers")]
    InvalidRange {
        /// The offending token, verbatim.
        token: String,
    },
}

/// Errors returned by [`StoreHandle`](crate::StoreHandle) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The query string could not be parsed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The request queue is full; the caller should retry later.
    #[error("event store overloaded: request queue is full")]
    Overloaded,

    /// The store did not answer within the configured request timeout.
    #[error("event store did not respond within {0:?}")]
    Timeout(std::time::Duration),

    /// The owning task has stopped.
    #[error("event store is not running")]
    Closed,
}
