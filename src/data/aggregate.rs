use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use crate::data::types::{DecodedEvent, Transaction};

/// Keep the successes, log and drop the failures.
///
/// Best-effort batches (log decoding, concurrent getter reads) go through here
/// so that one bad item never fails the whole batch.
pub fn collect_successes<T, E, I>(items: I) -> Vec<T>
where
    I: IntoIterator<Item = Result<T, E>>,
    E: Display,
{
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    for item in items {
        match item {
            Ok(value) => kept.push(value),
            Err(e) => {
                dropped += 1;
                tracing::debug!(reason = %e, "dropping item");
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(kept = kept.len(), dropped, "best-effort batch finished");
    }
    kept
}

/// Stable sort by timestamp, newest first.
pub fn sort_newest_first(events: &mut [DecodedEvent]) {
    events.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}

/// Remove later duplicates by key, keeping the first occurrence in place.
pub fn dedupe_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Logs are identified by `(transactionHash, logIndex)`.
pub fn dedupe_events(events: Vec<DecodedEvent>) -> Vec<DecodedEvent> {
    dedupe_by(events, DecodedEvent::key)
}

/// Transactions are identified by their hash.
pub fn dedupe_transactions(txs: Vec<Transaction>) -> Vec<Transaction> {
    dedupe_by(txs, Transaction::key)
}
