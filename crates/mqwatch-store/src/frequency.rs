//! Routing-key histograms over query results.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::message::Message;

/// Replacement for UUIDs embedded in routing keys.
pub const UUID_PLACEHOLDER: &str = "<uuid>";

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}(?:-[0-9a-fA-F]{4}){3}-[0-9a-fA-F]{12}")
        .expect("uuid pattern is valid")
});

/// Folds every UUID-shaped substring of `routing_key` into [`UUID_PLACEHOLDER`].
pub fn normalize_routing_key(routing_key: &str) -> String {
    UUID_RE.replace_all(routing_key, UUID_PLACEHOLDER).into_owned()
}

/// Counts messages per normalised routing key.
pub fn frequencies<'a, I>(messages: I) -> HashMap<String, usize>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut counts = HashMap::new();
    for message in messages {
        *counts
            .entry(normalize_routing_key(&message.routing_key))
            .or_insert(0) += 1;
    }
    counts
}

/// Like [`frequencies`], sorted by routing key for display.
pub fn sorted_frequencies<'a, I>(messages: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut sorted: Vec<_> = frequencies(messages).into_iter().collect();
    sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    sorted
}
