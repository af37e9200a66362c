//! Automatic resolution of textual conflicts in the document file.
//!
//! When a pull stops on a conflict, both revisions of the document are
//! recovered, merged semantically, written back, and the interrupted merge or
//! rebase is completed.
//!
//! # Recovering both revisions
//!
//! The index is read first: during a conflict git keeps "ours" at stage 2 and
//! "theirs" at stage 3 (`git show :2:<file>`). If that fails, the working copy
//! is split along its conflict markers; text outside a hunk belongs to both
//! sides and diff3 base sections are dropped.
//!
//! During a rebase "ours" is the upstream commit and "theirs" is the local
//! commit being replayed, so the two are swapped before merging.

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::Document;
use crate::store::DocumentStore;

use super::git::{self, Git};
use super::merge::merge;

const START_MARKER: &str = "<<<<<<<";
const BASE_MARKER: &str = "|||||||";
const SEPARATOR: &str = "=======";
const END_MARKER: &str = ">>>>>>>";

/// Commit message for a merge concluded by the resolver.
pub const MERGE_COMMIT_MESSAGE: &str = "Merge: Auto-resolved with JSON merge";

/// A rebase replays one commit per step; each step may conflict again.
const MAX_ROUNDS: usize = 32;

/// Whether the text contains any conflict marker line.
#[must_use]
pub fn has_conflict_markers(text: &str) -> bool {
    text.lines().any(|line| {
        line.starts_with(START_MARKER) || line.starts_with(SEPARATOR) || line.starts_with(END_MARKER)
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Both,
    Ours,
    Base,
    Theirs,
}

/// Split a conflicted file into its "ours" and "theirs" texts.
///
/// Returns `None` when there is no conflict or the markers are unbalanced.
#[must_use]
pub fn split_conflict(text: &str) -> Option<(String, String)> {
    let mut ours = String::with_capacity(text.len());
    let mut theirs = String::with_capacity(text.len());
    let mut section = Section::Both;
    let mut hunks = 0usize;

    for line in text.split_inclusive('\n') {
        if line.starts_with(START_MARKER) {
            if section != Section::Both {
                return None;
            }
            section = Section::Ours;
            hunks += 1;
            continue;
        }
        if line.starts_with(BASE_MARKER) && section == Section::Ours {
            section = Section::Base;
            continue;
        }
        if line.starts_with(SEPARATOR) && matches!(section, Section::Ours | Section::Base) {
            section = Section::Theirs;
            continue;
        }
        if line.starts_with(END_MARKER) {
            if section != Section::Theirs {
                return None;
            }
            section = Section::Both;
            continue;
        }

        match section {
            Section::Both => {
                ours.push_str(line);
                theirs.push_str(line);
            }
            Section::Ours => ours.push_str(line),
            Section::Theirs => theirs.push_str(line),
            Section::Base => {}
        }
    }

    (section == Section::Both && hunks > 0).then_some((ours, theirs))
}

/// Resolves a conflicted document in the storage directory's working tree.
pub struct ConflictResolver<'a, G: Git> {
    git: &'a G,
    store: &'a DocumentStore,
}

impl<'a, G: Git> ConflictResolver<'a, G> {
    pub fn new(git: &'a G, store: &'a DocumentStore) -> Self {
        Self { git, store }
    }

    /// Resolve the conflict and complete the interrupted operation.
    ///
    /// Returns `false` when the conflict cannot be resolved automatically;
    /// the repository is then left as it was for the caller to handle.
    pub async fn resolve(&self) -> bool {
        match self.try_resolve().await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, "Automatic conflict resolution failed");
                false
            }
        }
    }

    async fn try_resolve(&self) -> Result<bool> {
        for round in 1..=MAX_ROUNDS {
            if !self.merge_working_copy().await? {
                return Ok(false);
            }
            if !self.conclude().await? {
                return Ok(true);
            }
            debug!(round, "Next rebase step conflicted as well");
        }
        warn!(rounds = MAX_ROUNDS, "Gave up resolving rebase conflicts");
        Ok(false)
    }

    /// Merge both revisions and write the result over the working copy.
    async fn merge_working_copy(&self) -> Result<bool> {
        let rebasing = git::rebase_in_progress(self.store.dir());

        let (ours, theirs) = match self.index_revisions().await {
            Some(pair) => pair,
            None => match self.marker_revisions()? {
                Some(pair) => pair,
                None => return Ok(false),
            },
        };

        let (local, remote) = if rebasing {
            (theirs, ours)
        } else {
            (ours, theirs)
        };

        let merged = merge(&local, &remote);
        let items = merged.items.len();
        self.store.save(merged)?;
        info!(items, rebasing, "Resolved document conflict with JSON merge");
        Ok(true)
    }

    async fn index_revisions(&self) -> Option<(Document, Document)> {
        let file = self.store.file_name();
        let ours = self.git.run(&["show", &format!(":2:{file}")]).await.ok()?;
        let theirs = self.git.run(&["show", &format!(":3:{file}")]).await.ok()?;
        match (Document::parse(&ours), Document::parse(&theirs)) {
            (Ok(ours), Ok(theirs)) => Some((ours, theirs)),
            _ => {
                debug!("Index revisions are not valid documents");
                None
            }
        }
    }

    fn marker_revisions(&self) -> Result<Option<(Document, Document)>> {
        let text = std::fs::read_to_string(self.store.path())?;
        if !has_conflict_markers(&text) {
            debug!("No conflict markers in working copy");
            return Ok(None);
        }
        let Some((ours, theirs)) = split_conflict(&text) else {
            warn!("Unbalanced conflict markers in working copy");
            return Ok(None);
        };
        match (Document::parse(&ours), Document::parse(&theirs)) {
            (Ok(ours), Ok(theirs)) => Ok(Some((ours, theirs))),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Conflicting revisions are not valid documents");
                Ok(None)
            }
        }
    }

    /// Stage the result and finish the merge or the current rebase step.
    ///
    /// Returns `true` when the next rebase step conflicted and another round
    /// is needed.
    async fn conclude(&self) -> Result<bool> {
        let dir = self.store.dir();
        self.git.run(&["add", "--", self.store.file_name()]).await?;

        if git::rebase_in_progress(dir) {
            let step = match self.git.run(&["rebase", "--continue"]).await {
                Err(e) if git::is_empty_rebase_step(&e) => {
                    debug!("Merged result matches upstream, skipping commit");
                    self.git.run(&["rebase", "--skip"]).await
                }
                other => other,
            };
            return match step {
                Ok(_) => Ok(false),
                Err(e) if git::is_conflict(&e) && git::rebase_in_progress(dir) => Ok(true),
                Err(e) => Err(e),
            };
        }

        if git::merge_in_progress(dir) {
            self.git.run(&["commit", "-m", MERGE_COMMIT_MESSAGE]).await?;
        }
        Ok(false)
    }
}
