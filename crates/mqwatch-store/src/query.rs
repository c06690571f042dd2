//! Query language: tokenizer, clause model and matching.
//!
//! Parsing happens in the caller's task; only the resulting [`Query`] is
//! shipped to the store, so a malformed query never reaches the owner.

use crate::error::QueryError;
use crate::message::Message;

/// The raw query that requests the most recent messages without filtering.
pub const MATCH_ALL: &str = "*";

const KEY_PREFIX: &str = "key:";
const RANGE_PREFIX: char = '#';

/// Routing-key constraint of a [`Clause`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyFilter {
    /// Any routing key is accepted.
    #[default]
    Any,
    /// The routing key must equal this value exactly.
    Exact(String),
}

impl KeyFilter {
    /// Returns `true` if `routing_key` satisfies this filter.
    pub fn accepts(&self, routing_key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(key) => key == routing_key,
        }
    }
}

/// One AND-combined filter unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Substrings that must all occur in the message body.
    pub words: Vec<String>,
    /// Routing-key constraint.
    pub routing_key: KeyFilter,
    /// Lowest accepted sequence number (inclusive).
    pub seq_from: i64,
    /// Highest accepted sequence number (inclusive).
    pub seq_to: i64,
}

impl Default for Clause {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            routing_key: KeyFilter::Any,
            seq_from: 0,
            seq_to: i64::MAX,
        }
    }
}

/// OR-combined set of clauses.
pub type QuerySpec = Vec<Clause>;

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Return the newest messages without matching.
    All,
    /// Return messages accepted by at least one clause.
    Filter(QuerySpec),
}

/// A classified query token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `key:<value>`.
    Key(String),
    /// `#<from>-<to>`; `None` keeps the default bound.
    Range {
        /// Lower bound, if given.
        from: Option<i64>,
        /// Upper bound, if given.
        to: Option<i64>,
    },
    /// Any other token: a required body substring.
    Word(String),
}

impl Token {
    /// Classifies a single whitespace-free token.
    ///
    /// Rules are tried in order: key filter, sequence range, word. A token
    /// that starts with `#` but has no `-` is an ordinary word.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidRange`] if a range token has a bound that
    /// is not a decimal integer fitting in `i64`.
    pub fn classify(token: &str) -> Result<Self, QueryError> {
        if let Some(key) = token.strip_prefix(KEY_PREFIX) {
            return Ok(Self::Key(key.to_string()));
        }

        if let Some(range) = token.strip_prefix(RANGE_PREFIX) {
            if let Some((from, to)) = range.split_once('-') {
                let bound = |literal: &str| -> Result<Option<i64>, QueryError> {
                    if literal.is_empty() {
                        return Ok(None);
                    }
                    if !literal.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(QueryError::InvalidRange {
                            token: token.to_string(),
                        });
                    }
                    literal.parse().map(Some).map_err(|_| QueryError::InvalidRange {
                        token: token.to_string(),
                    })
                };
                return Ok(Self::Range {
                    from: bound(from)?,
                    to: bound(to)?,
                });
            }
        }

        Ok(Self::Word(token.to_string()))
    }
}

/// Returns `true` if `raw` is the match-all request: blank input, or
/// exactly [`MATCH_ALL`] with no surrounding whitespace.
pub fn is_match_all(raw: &str) -> bool {
    raw.trim().is_empty() || raw == MATCH_ALL
}

/// Parses a raw query string.
///
/// Clause groups are separated by newline or comma; empty groups are
/// skipped. Tokens within a group are separated by runs of whitespace.
///
/// # Errors
///
/// Returns [`QueryError::InvalidRange`] for a malformed `#M-N` token.
pub fn parse(raw: &str) -> Result<Query, QueryError> {
    if is_match_all(raw) {
        return Ok(Query::All);
    }

    let mut spec = QuerySpec::new();
    for group in raw.split(['\n', ',']) {
        let mut tokens = group.split_whitespace().peekable();
        if tokens.peek().is_none() {
            continue;
        }

        let mut clause = Clause::default();
        for token in tokens {
            match Token::classify(token)? {
                Token::Key(key) => clause.routing_key = KeyFilter::Exact(key),
                Token::Range { from, to } => {
                    if let Some(from) = from {
                        clause.seq_from = from;
                    }
                    if let Some(to) = to {
                        clause.seq_to = to;
                    }
                }
                Token::Word(word) => clause.words.push(word),
            }
        }
        spec.push(clause);
    }

    Ok(Query::Filter(spec))
}

/// Returns `true` if `message` satisfies every constraint of `clause`.
pub fn accepts_clause(message: &Message, clause: &Clause) -> bool {
    if message.seq < clause.seq_from || message.seq > clause.seq_to {
        return false;
    }
    if !clause
        .words
        .iter()
        .all(|word| contains_bytes(&message.body, word.as_bytes()))
    {
        return false;
    }
    clause.routing_key.accepts(&message.routing_key)
}

/// Returns `true` if at least one clause of `spec` accepts `message`.
///
/// An empty spec accepts nothing.
pub fn accepts_spec(message: &Message, spec: &[Clause]) -> bool {
    spec.iter().any(|clause| accepts_clause(message, clause))
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}
