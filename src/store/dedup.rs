//! Deduplication by identity key.

use std::collections::HashSet;

use crate::model::{Entry, Subscription};

/// Keep the first entry for each identity key, preserving input order.
///
/// Idempotent: a list whose keys are already unique comes back unchanged.
#[must_use]
pub fn dedup_entries(items: Vec<Entry>) -> Vec<Entry> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.identity_key()))
        .collect()
}

/// Keep the first subscription for each lowercased url.
#[must_use]
pub fn dedup_subscriptions(subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    let mut seen = HashSet::with_capacity(subscriptions.len());
    subscriptions
        .into_iter()
        .filter(|sub| seen.insert(sub.url_key()))
        .collect()
}
