//! Subscription management.
//!
//! Adding, removing, and refreshing subscriptions to peers, and folding each
//! peer's published entries into the local document.
//!
//! Network fetches happen before the document lock is taken; the merge and
//! the save then run inside one locked update so nothing written in between
//! is lost.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::model::entry::ARCHIVED_SUFFIX;
use crate::model::{Document, Entry, Subscription, SubscriptionStatus};
use crate::prompt::Prompt;
use crate::store::DocumentStore;

use super::fetcher::PeerFetcher;
use super::url::{PeerRepo, parse_repo_url};

/// What folding one peer feed into the document did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeCounts {
    pub added: usize,
    pub updated: usize,
    /// New peer entries dropped because a local entry has the same name.
    pub skipped: usize,
}

impl std::ops::AddAssign for MergeCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.skipped += other.skipped;
    }
}

/// Fold a peer's entries into `doc`.
///
/// An entry already mirrored from this peer is refreshed in place (local id,
/// pin, and creation time kept). A new peer entry is inserted as a mirror
/// unless a locally authored entry already has its name.
pub fn apply_peer_entries(doc: &mut Document, username: &str, peer_items: &[Entry]) -> MergeCounts {
    let mut counts = MergeCounts::default();

    for peer in peer_items {
        let existing = doc.items.iter_mut().find(|item| {
            item.is_from(username)
                && (item.original_id.as_deref() == Some(peer.id.as_str()) || item.id == peer.id)
        });
        if let Some(item) = existing {
            item.refresh_from(peer, username);
            counts.updated += 1;
            continue;
        }

        if doc.items.iter().any(|item| item.is_local() && item.name == peer.name) {
            debug!(name = %peer.name, %username, "Local entry has this name, skipping");
            counts.skipped += 1;
            continue;
        }

        doc.items.push(Entry::mirror_of(peer, username));
        counts.added += 1;
    }

    counts
}

/// Result of subscribing.
#[derive(Debug, Clone, Serialize)]
pub struct AddReport {
    pub username: String,
    pub url: String,
    #[serde(flatten)]
    pub counts: MergeCounts,
}

/// What happens to a peer's entries when unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    /// Delete every entry mirrored from the peer.
    RemoveItems,
    /// Keep the entries, relabelled as archived.
    Archive,
    Cancel,
}

impl Removal {
    pub const ALL: [Self; 3] = [Self::RemoveItems, Self::Archive, Self::Cancel];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RemoveItems => "Remove their items",
            Self::Archive => "Keep their items (archive)",
            Self::Cancel => "Cancel",
        }
    }
}

/// Result of unsubscribing.
#[derive(Debug, Clone, Serialize)]
pub struct RemoveReport {
    pub username: String,
    pub disposition: Removal,
    /// Entries removed or archived.
    pub affected: usize,
}

/// Result of refreshing every subscription.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshReport {
    pub synced: usize,
    #[serde(flatten)]
    pub counts: MergeCounts,
    /// Usernames whose fetch failed.
    pub unreachable: Vec<String>,
}

/// A subscription as shown in the peer list.
#[derive(Debug, Clone, Serialize)]
pub struct PeerListing {
    #[serde(flatten)]
    pub subscription: Subscription,
    /// Repository name, when the url parses.
    pub name: Option<String>,
    /// `owner/repo`, when the url parses.
    pub full_name: Option<String>,
}

/// Orchestrates subscriptions for one document store.
pub struct SubscriptionManager<F: PeerFetcher> {
    store: DocumentStore,
    fetcher: F,
    raw_host: String,
    branch: String,
}

impl<F: PeerFetcher> SubscriptionManager<F> {
    pub fn new(store: DocumentStore, fetcher: F, settings: &Settings) -> Self {
        Self {
            store,
            fetcher,
            raw_host: settings.raw_host.clone(),
            branch: settings.branch.clone(),
        }
    }

    fn document_url(&self, repo: &PeerRepo) -> String {
        repo.raw_document_url(&self.raw_host, &self.branch, self.store.file_name())
    }

    /// Subscribe to a peer repository and import its entries.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if the URL is not a GitHub repository URL
    /// - `AlreadySubscribed` if the url or its owner is already subscribed
    /// - a peer error if the document cannot be fetched or parsed
    pub async fn add(&self, url: &str) -> Result<AddReport> {
        let repo = parse_repo_url(url)?;
        check_not_subscribed(&self.store.try_load()?, &repo)?;

        let peer = self.fetcher.fetch(&self.document_url(&repo)).await?;

        let report = self
            .store
            .update(|doc| {
                check_not_subscribed(doc, &repo)?;
                let counts = apply_peer_entries(doc, &repo.owner, &peer.items);
                doc.subscriptions
                    .push(Subscription::new(&repo.owner, &repo.url));
                Ok(AddReport {
                    username: repo.owner.clone(),
                    url: repo.url.clone(),
                    counts,
                })
            })
            .await?;

        info!(
            username = %report.username,
            added = report.counts.added,
            updated = report.counts.updated,
            "Subscribed"
        );
        Ok(report)
    }

    fn find(&self, id: &str) -> Result<Subscription> {
        self.store
            .try_load()?
            .subscriptions
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::SubscriptionNotFound { id: id.to_string() })
    }

    /// Ask what to do with the peer's entries, then unsubscribe.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionNotFound` for an unknown id.
    pub async fn remove_with_prompt(&self, id: &str, prompt: &impl Prompt) -> Result<RemoveReport> {
        let sub = self.find(id)?;
        let labels = Removal::ALL.map(Removal::label);
        let question = format!(
            "Unsubscribe from {}. What should happen to their items?",
            sub.username
        );
        let index = prompt.select(&question, &labels, 1).min(Removal::ALL.len() - 1);
        self.remove(id, Removal::ALL[index]).await
    }

    /// Unsubscribe, disposing of the peer's entries as chosen.
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionNotFound` for an unknown id.
    pub async fn remove(&self, id: &str, disposition: Removal) -> Result<RemoveReport> {
        let report = self
            .store
            .update(|doc| {
                let pos = doc
                    .subscriptions
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| Error::SubscriptionNotFound { id: id.to_string() })?;
                let username = doc.subscriptions[pos].username.clone();

                let affected = match disposition {
                    Removal::Cancel => 0,
                    Removal::RemoveItems => {
                        let before = doc.items.len();
                        doc.items.retain(|item| !item.is_from(&username));
                        before - doc.items.len()
                    }
                    Removal::Archive => {
                        let archived = format!("{username}{ARCHIVED_SUFFIX}");
                        let mut n = 0;
                        for item in doc.items.iter_mut().filter(|i| i.is_from(&username)) {
                            item.source = Some(archived.clone());
                            n += 1;
                        }
                        n
                    }
                };
                if disposition != Removal::Cancel {
                    doc.subscriptions.remove(pos);
                }

                Ok(RemoveReport {
                    username,
                    disposition,
                    affected,
                })
            })
            .await?;

        if report.disposition != Removal::Cancel {
            info!(username = %report.username, affected = report.affected, "Unsubscribed");
        }
        Ok(report)
    }

    /// Re-fetch every subscription and fold in their entries.
    ///
    /// A failing peer is marked unreachable; the rest still refresh. The
    /// document is saved once.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local document cannot be read or written.
    pub async fn refresh_all(&self) -> Result<RefreshReport> {
        let subscriptions = self.store.try_load()?.subscriptions;

        let mut results = Vec::with_capacity(subscriptions.len());
        for sub in &subscriptions {
            let fetched = match parse_repo_url(&sub.url) {
                Ok(repo) => self.fetcher.fetch(&self.document_url(&repo)).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &fetched {
                warn!(username = %sub.username, error = %e, "Peer unreachable");
            }
            results.push((sub.id.clone(), sub.url_key(), fetched));
        }

        self.store
            .update(|doc| {
                let mut report = RefreshReport::default();
                for (id, url_key, fetched) in results {
                    // Older documents may repeat ids, so the url must match too.
                    // No match means it was unsubscribed while fetching.
                    let Some(pos) = doc
                        .subscriptions
                        .iter()
                        .position(|s| s.id == id && s.url_key() == url_key)
                    else {
                        continue;
                    };
                    let username = doc.subscriptions[pos].username.clone();
                    match fetched {
                        Ok(peer) => {
                            report.counts += apply_peer_entries(doc, &username, &peer.items);
                            doc.subscriptions[pos].mark_synced();
                            report.synced += 1;
                        }
                        Err(_) => {
                            doc.subscriptions[pos].status = SubscriptionStatus::Unreachable;
                            report.unreachable.push(username);
                        }
                    }
                }
                Ok(report)
            })
            .await
    }

    /// Every subscription with its repository details.
    ///
    /// # Errors
    ///
    /// Returns an error if the local document cannot be read.
    pub fn peer_repositories(&self) -> Result<Vec<PeerListing>> {
        Ok(self
            .store
            .try_load()?
            .subscriptions
            .into_iter()
            .map(|sub| {
                let repo = parse_repo_url(&sub.url).ok();
                PeerListing {
                    name: repo.as_ref().map(|r| r.repo.clone()),
                    full_name: repo.as_ref().map(PeerRepo::full_name),
                    subscription: sub,
                }
            })
            .collect())
    }
}

fn check_not_subscribed(doc: &Document, repo: &PeerRepo) -> Result<()> {
    let existing = doc.subscriptions.iter().find(|s| {
        s.url.eq_ignore_ascii_case(&repo.url) || s.username.eq_ignore_ascii_case(&repo.owner)
    });
    match existing {
        Some(sub) => Err(Error::AlreadySubscribed {
            url: sub.url.clone(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryKind;
    use crate::testing::{ScriptedPrompt, StaticFetcher};
    use serde_json::json;
    use tempfile::TempDir;

    const ALICE_REPO: &str = "https://github.com/Alice/commands";
    const ALICE_RAW: &str = "https://raw.githubusercontent.com/alice/commands/main/data.json";
    const BOB_REPO: &str = "https://github.com/bob/cmds";
    const BOB_RAW: &str = "https://raw.githubusercontent.com/bob/cmds/main/data.json";

    fn manager(temp_dir: &TempDir, fetcher: StaticFetcher) -> SubscriptionManager<StaticFetcher> {
        let store = DocumentStore::new(temp_dir.path(), "data.json");
        SubscriptionManager::new(store, fetcher, &Settings::default())
    }

    fn peer_doc(items: serde_json::Value) -> String {
        json!({"items": items, "subscriptions": []}).to_string()
    }

    fn seed(m: &SubscriptionManager<StaticFetcher>, items: Vec<Entry>) {
        m.store
            .save(Document {
                items,
                subscriptions: Vec::new(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_imports_new_item() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new()
            .serve(ALICE_RAW, &peer_doc(json!([{"id": "1", "name": "ls", "content": "ls -la"}])));
        let m = manager(&temp_dir, fetcher);

        let report = m.add(ALICE_REPO).await.unwrap();
        assert_eq!(report.username, "alice");
        assert_eq!(report.counts.added, 1);

        let doc = m.store.load();
        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.source.as_deref(), Some("alice"));
        assert_eq!(item.original_id.as_deref(), Some("1"));
        assert!(!item.pinned);
        assert_ne!(item.id, "1");

        assert_eq!(doc.subscriptions.len(), 1);
        assert_eq!(doc.subscriptions[0].status, SubscriptionStatus::Active);
        assert!(!doc.subscriptions[0].last_synced.is_empty());
    }

    #[tokio::test]
    async fn test_add_name_collision_keeps_local() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new()
            .serve(ALICE_RAW, &peer_doc(json!([{"id": "9", "name": "ls", "content": "ls -A"}])));
        let m = manager(&temp_dir, fetcher);
        let local = Entry::new_local(EntryKind::Commands, "ls", "ls");
        seed(&m, vec![local.clone()]);

        let report = m.add(ALICE_REPO).await.unwrap();
        assert_eq!(report.counts.added, 0);
        assert_eq!(report.counts.skipped, 1);

        let doc = m.store.load();
        assert_eq!(doc.items, vec![local]);
    }

    #[tokio::test]
    async fn test_refresh_updates_mirror_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let before = StaticFetcher::new().serve(
            ALICE_RAW,
            &peer_doc(json!([{"id": "2", "name": "grep-all", "content": "grep -r"}])),
        );
        let m = manager(&temp_dir, before);
        m.add(ALICE_REPO).await.unwrap();

        let mirrored_id = m
            .store
            .update(|doc| {
                let item = &mut doc.items[0];
                item.pinned = true;
                Ok(item.id.clone())
            })
            .await
            .unwrap();

        let after = StaticFetcher::new().serve(
            ALICE_RAW,
            &peer_doc(json!([{"id": "2", "name": "grep-all", "content": "grep -rn"}])),
        );
        let m = manager(&temp_dir, after);
        let report = m.refresh_all().await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.counts.updated, 1);

        let doc = m.store.load();
        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.content, "grep -rn");
        assert_eq!(item.id, mirrored_id);
        assert!(item.pinned);
    }

    #[tokio::test]
    async fn test_refresh_updates_even_if_local_name_collides_later() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(
            &temp_dir,
            StaticFetcher::new().serve(ALICE_RAW, &peer_doc(json!([{"id": "2", "name": "x", "content": "a"}]))),
        );
        m.add(ALICE_REPO).await.unwrap();
        m.store
            .update(|doc| {
                doc.items.push(Entry::new_local(EntryKind::Commands, "x", "mine"));
                Ok(())
            })
            .await
            .unwrap();

        let m = manager(
            &temp_dir,
            StaticFetcher::new().serve(ALICE_RAW, &peer_doc(json!([{"id": "2", "name": "x", "content": "b"}]))),
        );
        let report = m.refresh_all().await.unwrap();
        assert_eq!(report.counts.updated, 1);
        let contents: Vec<String> = m.store.load().items.into_iter().map(|e| e.content).collect();
        assert_eq!(contents, vec!["b", "mine"]);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::new().serve(ALICE_RAW, &peer_doc(json!([])));
        let m = manager(&temp_dir, fetcher);
        m.add(ALICE_REPO).await.unwrap();

        let err = m.add("https://github.com/alice/COMMANDS/").await.unwrap_err();
        assert!(matches!(err, Error::AlreadySubscribed { .. }));
        assert_eq!(m.fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_add_fetch_failure_changes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(&temp_dir, StaticFetcher::new().fail(ALICE_RAW, 500));

        let err = m.add(ALICE_REPO).await.unwrap_err();
        assert!(err.is_peer_failure());
        assert!(m.store.load().subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_add_invalid_url() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(&temp_dir, StaticFetcher::new());
        assert!(matches!(m.add("alice/commands").await, Err(Error::InvalidUrl(_))));
        assert!(m.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_marks_unreachable_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(
            &temp_dir,
            StaticFetcher::new()
                .serve(ALICE_RAW, &peer_doc(json!([])))
                .serve(BOB_RAW, &peer_doc(json!([]))),
        );
        m.add(ALICE_REPO).await.unwrap();
        m.add(BOB_REPO).await.unwrap();

        let m = manager(
            &temp_dir,
            StaticFetcher::new()
                .fail(ALICE_RAW, 404)
                .serve(BOB_RAW, &peer_doc(json!([{"id": "7", "name": "du", "content": "du -sh"}]))),
        );
        let report = m.refresh_all().await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(report.unreachable, vec!["alice"]);
        assert_eq!(report.counts.added, 1);

        let doc = m.store.load();
        let status = |name: &str| {
            doc.subscriptions
                .iter()
                .find(|s| s.username == name)
                .map(|s| s.status)
                .unwrap()
        };
        assert_eq!(status("alice"), SubscriptionStatus::Unreachable);
        assert_eq!(status("bob"), SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_refresh_with_repeated_ids_updates_each_peer() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(
            &temp_dir,
            StaticFetcher::new()
                .fail(ALICE_RAW, 404)
                .serve(BOB_RAW, &peer_doc(json!([{"id": "7", "name": "du", "content": "du -sh"}]))),
        );
        let mut alice = Subscription::new("alice", ALICE_REPO);
        let mut bob = Subscription::new("bob", BOB_REPO);
        alice.id = "1700000000000".to_string();
        bob.id.clone_from(&alice.id);
        bob.status = SubscriptionStatus::Unreachable;
        m.store
            .save(Document {
                items: Vec::new(),
                subscriptions: vec![alice, bob],
            })
            .unwrap();

        let report = m.refresh_all().await.unwrap();
        assert_eq!(report.unreachable, vec!["alice"]);
        assert_eq!(report.synced, 1);

        let doc = m.store.load();
        let by_name = |name: &str| doc.subscriptions.iter().find(|s| s.username == name).unwrap();
        assert_eq!(by_name("alice").status, SubscriptionStatus::Unreachable);
        assert_eq!(by_name("bob").status, SubscriptionStatus::Active);
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].source.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn test_added_subscriptions_get_distinct_ids() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(
            &temp_dir,
            StaticFetcher::new()
                .serve(ALICE_RAW, &peer_doc(json!([])))
                .serve(BOB_RAW, &peer_doc(json!([]))),
        );
        m.add(ALICE_REPO).await.unwrap();
        m.add(BOB_REPO).await.unwrap();

        let doc = m.store.load();
        assert_eq!(doc.subscriptions.len(), 2);
        assert_ne!(doc.subscriptions[0].id, doc.subscriptions[1].id);

        let bob_id = doc.subscriptions[1].id.clone();
        let report = m.remove(&bob_id, Removal::RemoveItems).await.unwrap();
        assert_eq!(report.username, "bob");
        let remaining = m.store.load().subscriptions;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].username, "alice");
    }

    async fn subscribed_with_items(temp_dir: &TempDir) -> (SubscriptionManager<StaticFetcher>, String) {
        let fetcher = StaticFetcher::new().serve(
            ALICE_RAW,
            &peer_doc(json!([
                {"id": "1", "name": "a", "content": "a"},
                {"id": "2", "name": "b", "content": "b"}
            ])),
        );
        let m = manager(temp_dir, fetcher);
        m.add(ALICE_REPO).await.unwrap();
        m.store
            .update(|doc| {
                doc.items.push(Entry::new_local(EntryKind::Commands, "mine", "x"));
                Ok(())
            })
            .await
            .unwrap();
        let id = m.store.load().subscriptions[0].id.clone();
        (m, id)
    }

    #[tokio::test]
    async fn test_remove_items() {
        let temp_dir = TempDir::new().unwrap();
        let (m, id) = subscribed_with_items(&temp_dir).await;

        let report = m.remove(&id, Removal::RemoveItems).await.unwrap();
        assert_eq!(report.affected, 2);
        let doc = m.store.load();
        assert!(doc.subscriptions.is_empty());
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].name, "mine");
    }

    #[tokio::test]
    async fn test_remove_archive_relabels() {
        let temp_dir = TempDir::new().unwrap();
        let (m, id) = subscribed_with_items(&temp_dir).await;

        let report = m.remove(&id, Removal::Archive).await.unwrap();
        assert_eq!(report.affected, 2);
        let doc = m.store.load();
        assert!(doc.subscriptions.is_empty());
        assert_eq!(doc.items.len(), 3);
        assert!(
            doc.items
                .iter()
                .filter(|e| !e.is_local())
                .all(|e| e.source.as_deref() == Some("alice (Archived)"))
        );
    }

    #[tokio::test]
    async fn test_remove_with_prompt_cancel_keeps_everything() {
        let temp_dir = TempDir::new().unwrap();
        let (m, id) = subscribed_with_items(&temp_dir).await;
        let prompt = ScriptedPrompt::new().select_with(2);

        let report = m.remove_with_prompt(&id, &prompt).await.unwrap();
        assert_eq!(report.disposition, Removal::Cancel);
        let doc = m.store.load();
        assert_eq!(doc.subscriptions.len(), 1);
        assert_eq!(doc.items.len(), 3);
        assert_eq!(prompt.asked().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_id() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(&temp_dir, StaticFetcher::new());
        assert!(matches!(
            m.remove("nope", Removal::RemoveItems).await,
            Err(Error::SubscriptionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_peer_repositories() {
        let temp_dir = TempDir::new().unwrap();
        let m = manager(&temp_dir, StaticFetcher::new().serve(BOB_RAW, &peer_doc(json!([]))));
        m.add(BOB_REPO).await.unwrap();
        let repos = m.peer_repositories().unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].full_name.as_deref(), Some("bob/cmds"));
        assert_eq!(repos[0].name.as_deref(), Some("cmds"));
        assert_eq!(repos[0].subscription.username, "bob");
    }
}
