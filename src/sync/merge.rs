//! Semantic merge of two documents.
//!
//! Used when git reports a textual conflict, when pre-fetching the remote
//! copy on load, and anywhere two revisions of the document must become one.
//! Pure: no I/O.
//!
//! # Rules
//!
//! - Entries are matched by identity key. Remote entries seed the result in
//!   order; local entries then overwrite in place or append.
//! - For a key on both sides the revision with the higher recency score is
//!   the base record (local wins ties); `pinned` is the OR of both sides.
//! - Subscriptions are unioned by lowercased url; on a clash the one synced
//!   later wins.

use std::collections::HashMap;
use std::hash::Hash;

use crate::model::{Document, Entry, IdentityKey, Subscription};

/// Insertion-ordered map: overwriting a key keeps its original position.
struct OrderedMap<K, V> {
    index: HashMap<K, usize>,
    values: Vec<V>,
}

impl<K: Eq + Hash, V> OrderedMap<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.values[i])
    }

    fn set(&mut self, key: K, value: V) {
        if let Some(&i) = self.index.get(&key) {
            self.values[i] = value;
        } else {
            self.index.insert(key, self.values.len());
            self.values.push(value);
        }
    }

    fn into_values(self) -> Vec<V> {
        self.values
    }
}

/// Merge `local` and `remote` into one reconciled document.
#[must_use]
pub fn merge(local: &Document, remote: &Document) -> Document {
    Document {
        items: merge_entries(&local.items, &remote.items),
        subscriptions: merge_subscriptions(&local.subscriptions, &remote.subscriptions),
    }
}

fn merge_entries(local: &[Entry], remote: &[Entry]) -> Vec<Entry> {
    let mut merged: OrderedMap<IdentityKey, Entry> =
        OrderedMap::with_capacity(local.len() + remote.len());

    for item in remote {
        merged.set(item.identity_key(), item.clone());
    }

    for item in local {
        let key = item.identity_key();
        let resolved = match merged.get(&key) {
            Some(existing) => resolve_pair(item, existing),
            None => item.clone(),
        };
        merged.set(key, resolved);
    }

    merged.into_values()
}

/// Pick the base record for two revisions of one entry.
fn resolve_pair(local: &Entry, remote: &Entry) -> Entry {
    let pinned = local.pinned || remote.pinned;
    let base = if local.recency() >= remote.recency() {
        local
    } else {
        remote
    };
    Entry {
        pinned,
        ..base.clone()
    }
}

fn merge_subscriptions(local: &[Subscription], remote: &[Subscription]) -> Vec<Subscription> {
    let mut merged: OrderedMap<String, Subscription> =
        OrderedMap::with_capacity(local.len() + remote.len());

    for sub in remote.iter().chain(local) {
        let key = sub.url_key();
        let replace = merged
            .get(&key)
            .is_none_or(|existing| sub.synced_after(existing));
        if replace {
            merged.set(key, sub.clone());
        }
    }

    merged.into_values()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        Document::parse(&value.to_string()).unwrap()
    }

    fn keys(doc: &Document) -> Vec<String> {
        doc.items.iter().map(|e| e.identity_key().to_string()).collect()
    }

    #[test]
    fn test_merge_is_idempotent() {
        let d = doc(json!({
            "items": [
                {"id": "100", "name": "a", "content": "a", "pinned": true},
                {"id": "200", "name": "b", "content": "b"},
                {"id": "300x", "name": "c", "content": "c", "source": "alice", "originalId": "9"}
            ],
            "subscriptions": [
                {"id": "1", "username": "alice", "url": "https://github.com/alice/c", "status": "active", "lastSynced": "2025-01-01T00:00:00Z"}
            ]
        }));
        assert_eq!(merge(&d, &d), d);
    }

    #[test]
    fn test_pin_survives_from_either_side() {
        let pinned = doc(json!([{"id": "100", "name": "a", "content": "a", "pinned": true}]));
        let unpinned = doc(json!([{"id": "100", "name": "a", "content": "a2", "pinned": false}]));

        assert!(merge(&pinned, &unpinned).items[0].pinned);
        assert!(merge(&unpinned, &pinned).items[0].pinned);
    }

    #[test]
    fn test_recency_tie_break() {
        let older = doc(json!([{
            "id": "100-a", "name": "old", "content": "old", "notes": "old notes",
            "source": "alice", "originalId": "x", "pinned": true
        }]));
        let newer = doc(json!([{
            "id": "200-b", "name": "new", "content": "new", "notes": "new notes",
            "source": "alice", "originalId": "x"
        }]));

        for merged in [merge(&older, &newer), merge(&newer, &older)] {
            assert_eq!(merged.items.len(), 1);
            let item = &merged.items[0];
            assert_eq!(item.id, "200-b");
            assert_eq!(item.content, "new");
            assert_eq!(item.notes.as_deref(), Some("new notes"));
            assert!(item.pinned);
        }
    }

    #[test]
    fn test_local_wins_ties_and_unparseable_ids_score_zero() {
        let local = doc(json!([{"id": "abc", "name": "n", "content": "local"}]));
        let remote = doc(json!([{"id": "abc", "name": "n", "content": "remote"}]));
        assert_eq!(merge(&local, &remote).items[0].content, "local");
    }

    #[test]
    fn test_one_sided_entries_kept_in_remote_then_local_order() {
        let local = doc(json!([
            {"id": "2", "name": "shared", "content": "l"},
            {"id": "3", "name": "local-only", "content": "l"}
        ]));
        let remote = doc(json!([
            {"id": "1", "name": "remote-only", "content": "r"},
            {"id": "2", "name": "shared", "content": "r"}
        ]));
        let merged = merge(&local, &remote);
        assert_eq!(keys(&merged), vec!["local:1", "local:2", "local:3"]);
        assert_eq!(merged.items[1].content, "l");
    }

    #[test]
    fn test_legacy_side_merges_with_object_side() {
        let legacy = doc(json!([{"id": "5", "name": "x", "content": "x"}]));
        let current = doc(json!({
            "items": [],
            "subscriptions": [{"id": "1", "username": "bob", "url": "https://github.com/bob/r"}]
        }));
        let merged = merge(&legacy, &current);
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.subscriptions.len(), 1);
    }

    #[test]
    fn test_subscriptions_keep_later_sync() {
        let local = doc(json!({"subscriptions": [{
            "id": "1", "username": "alice", "url": "https://github.com/Alice/cmds",
            "status": "unreachable", "lastSynced": "2025-03-01T00:00:00Z"
        }]}));
        let remote = doc(json!({"subscriptions": [{
            "id": "2", "username": "alice", "url": "https://github.com/alice/cmds",
            "status": "active", "lastSynced": "2025-02-01T00:00:00Z"
        }]}));

        let merged = merge(&local, &remote);
        assert_eq!(merged.subscriptions.len(), 1);
        assert_eq!(merged.subscriptions[0].id, "1");

        let merged = merge(&remote, &local);
        assert_eq!(merged.subscriptions[0].id, "1");
    }

    #[test]
    fn test_merge_is_deterministic() {
        let local = doc(json!([{"id": "1", "name": "a", "content": "a"}, {"id": "9", "name": "z", "content": "z"}]));
        let remote = doc(json!([{"id": "5", "name": "m", "content": "m"}]));
        assert_eq!(merge(&local, &remote), merge(&local, &remote));
    }
}
