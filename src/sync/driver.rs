//! Git sync driver.
//!
//! Owns the storage directory's working tree and runs the sync state
//! machine: first-time setup, interactive "sync now", silent background sync
//! after saves, pull-only, reconfiguration, and the pre-fetch merge on load.
//!
//! # Locking
//!
//! Every public operation holds the storage directory guard from
//! [`lock_dir`] for its whole duration. Private helpers assume the guard is
//! held and never take it again.
//!
//! # Example
//!
//! ```ignore
//! let driver = SyncDriver::new(GitCli::new(&dir), TerminalPrompt::new(false), store, &settings);
//! let report = driver.sync_now().await?;
//! ```

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::model::Document;
use crate::prompt::Prompt;
use crate::store::{DocumentStore, lock_dir};

use super::conflict::ConflictResolver;
use super::git::{self, Git};
use super::merge::merge;
use super::types::{
    AutoSyncOutcome, DivergenceChoice, LoadedDocument, ResetChoice, ResetOutcome,
    SkipReason, SyncOutcome, SyncReport, SyncStatus,
};

const SETUP_QUESTION: &str = "Git sync is not configured. Set it up now?";
const REMOTE_QUESTION: &str = "Enter the Git remote URL (e.g. https://github.com/you/commands.git)";
const INTERRUPTED_QUESTION: &str =
    "The repository is in a conflicted state from a previous sync. Abort it and reset?";
const DIVERGED_QUESTION: &str = "Remote has changes that conflict with local. What do you want to do?";
const RESET_QUESTION: &str = "What would you like to do?";
const NEW_REMOTE_QUESTION: &str = "Enter the new Git remote URL";
const REMOVE_QUESTION: &str =
    "This will remove Git sync. Your data will remain but won't sync. Continue?";

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Drives git for one storage directory.
pub struct SyncDriver<G: Git, P: Prompt> {
    git: G,
    prompt: P,
    store: DocumentStore,
    remote: String,
    branch: String,
}

impl<G: Git, P: Prompt> SyncDriver<G, P> {
    pub fn new(git: G, prompt: P, store: DocumentStore, settings: &Settings) -> Self {
        Self {
            git,
            prompt,
            store,
            remote: settings.remote.clone(),
            branch: settings.branch.clone(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Whether the storage directory is a git working tree.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        git::is_repository(self.store.dir())
    }

    /// Whether a merge or rebase was left unfinished.
    #[must_use]
    pub fn is_conflicted(&self) -> bool {
        git::operation_in_progress(self.store.dir())
    }

    fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }

    fn resolver(&self) -> ConflictResolver<'_, G> {
        ConflictResolver::new(&self.git, &self.store)
    }

    // ── Setup ─────────────────────────────────────────────────

    /// Offer to set up git sync if it is not configured.
    ///
    /// Returns `true` when the directory is (now) a working tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a setup step fails.
    pub async fn ensure_initialized(&self) -> Result<bool> {
        let _guard = lock_dir(self.store.dir()).await;
        self.setup_interactively().await
    }

    /// Set up git sync with the given remote, without asking.
    ///
    /// Returns `false` if the directory was already a working tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a setup step fails.
    pub async fn initialize(&self, remote_url: &str) -> Result<bool> {
        let _guard = lock_dir(self.store.dir()).await;
        if self.is_initialized() {
            return Ok(false);
        }
        self.init_repository(remote_url).await?;
        Ok(true)
    }

    async fn setup_interactively(&self) -> Result<bool> {
        if self.is_initialized() {
            return Ok(true);
        }
        if !self.prompt.confirm(SETUP_QUESTION, false) {
            return Ok(false);
        }
        let Some(url) = self.prompt.input(REMOTE_QUESTION) else {
            return Ok(false);
        };
        self.init_repository(url.trim()).await?;
        Ok(true)
    }

    async fn init_repository(&self, remote_url: &str) -> Result<()> {
        if remote_url.is_empty() {
            return Err(Error::InvalidArgument("Remote URL cannot be empty".to_string()));
        }
        let file = self.store.file_name();
        self.git.run(&["init", "-b", &self.branch]).await?;
        self.git
            .run(&["remote", "add", &self.remote, remote_url])
            .await?;
        self.store.ensure_exists()?;
        self.git.run(&["add", "--", file]).await?;
        self.git.run(&["commit", "-m", "Initial commit"]).await?;
        info!(remote = %remote_url, dir = %self.store.dir().display(), "Git sync initialized");
        Ok(())
    }

    // ── Building blocks (guard held by caller) ─────────────────

    async fn has_pending_changes(&self) -> Result<bool> {
        let out = self
            .git
            .run(&["status", "--porcelain", "--", self.store.file_name()])
            .await?;
        Ok(!out.trim().is_empty())
    }

    /// Stage the document and commit it if anything changed.
    async fn commit_pending(&self, prefix: &str) -> Result<bool> {
        self.git.run(&["add", "--", self.store.file_name()]).await?;
        if !self.has_pending_changes().await? {
            return Ok(false);
        }
        let message = format!("{prefix}: {}", timestamp());
        self.git.run(&["commit", "-m", &message]).await?;
        debug!(%message, "Committed document");
        Ok(true)
    }

    /// Abort any unfinished merge and rebase. Failures are ignored.
    async fn abort_in_progress(&self) {
        for args in [["merge", "--abort"], ["rebase", "--abort"]] {
            if let Err(e) = self.git.run(&args).await {
                debug!(error = %e, "Nothing to abort");
            }
        }
    }

    /// Ask to abort an operation a previous sync left unfinished.
    async fn recover_interrupted(&self) -> Result<()> {
        if !self.is_conflicted() {
            return Ok(());
        }
        if !self.prompt.confirm(INTERRUPTED_QUESTION, false) {
            return Err(Error::Conflicted);
        }
        self.abort_in_progress().await;
        info!("Aborted unfinished merge/rebase");
        Ok(())
    }

    async fn pull_rebase(&self) -> Result<String> {
        self.git
            .run(&["pull", "--rebase", &self.remote, &self.branch])
            .await
    }

    async fn resolve_or_escalate(&self) -> Result<()> {
        if self.resolver().resolve().await {
            Ok(())
        } else {
            warn!("Conflict needs manual resolution");
            Err(Error::ManualInterventionRequired)
        }
    }

    /// Pull with rebase, recovering from unrelated histories and conflicts.
    ///
    /// Returns whether a conflict was resolved.
    async fn pull_reconciling(&self) -> Result<bool> {
        let err = match self.pull_rebase().await {
            Ok(_) => return Ok(false),
            Err(e) => e,
        };

        if git::is_missing_remote_branch(&err) {
            debug!("Remote branch does not exist yet");
            return Ok(false);
        }

        if git::is_unrelated_histories(&err) {
            info!("Reconciling unrelated histories");
            let retry = self
                .git
                .run(&[
                    "pull",
                    "--no-rebase",
                    "--allow-unrelated-histories",
                    "--no-edit",
                    &self.remote,
                    &self.branch,
                ])
                .await;
            return match retry {
                Ok(_) => Ok(false),
                Err(e) if git::is_conflict(&e) => self.resolve_or_escalate().await.map(|()| true),
                Err(e) => Err(Error::ReconcileFailed(git::diagnostics(&e))),
            };
        }

        if git::is_conflict(&err) || self.is_conflicted() {
            info!("Pull stopped on a conflict, merging documents");
            return self.resolve_or_escalate().await.map(|()| true);
        }

        Err(Error::PullFailed(git::diagnostics(&err)))
    }

    fn reload(&self) -> Result<Document> {
        self.store.try_load()
    }

    // ── Sync now ──────────────────────────────────────────────

    /// Interactive full sync: commit, pull (with recovery), push.
    ///
    /// # Errors
    ///
    /// - `Conflicted` if an unfinished operation exists and the user keeps it
    /// - `ReconcileFailed` / `PullFailed` if the pull cannot complete
    /// - `ManualInterventionRequired` if a conflict cannot be merged
    /// - `Git` for any other failing git step
    pub async fn sync_now(&self) -> Result<SyncReport> {
        let _guard = lock_dir(self.store.dir()).await;

        if !self.setup_interactively().await? {
            return Ok(SyncReport::new(SyncOutcome::NotConfigured));
        }
        self.recover_interrupted().await?;

        let committed = self.commit_pending("Sync").await?;
        let conflict_resolved = self.pull_reconciling().await?;

        let mut report = self.push_or_recover().await?;
        report.committed = committed;
        report.conflict_resolved = conflict_resolved;
        Ok(report)
    }

    async fn push_or_recover(&self) -> Result<SyncReport> {
        let err = match self
            .git
            .run(&["push", "-u", &self.remote, &self.branch])
            .await
        {
            Ok(_) => {
                info!("Sync complete");
                return self.finish(SyncOutcome::Completed);
            }
            Err(e) => e,
        };

        if !git::is_non_fast_forward(&err) {
            return Err(err);
        }

        let labels = DivergenceChoice::ALL.map(DivergenceChoice::label);
        let cancel = DivergenceChoice::ALL.len() - 1;
        let index = self.prompt.select(DIVERGED_QUESTION, &labels, cancel).min(cancel);

        match DivergenceChoice::ALL[index] {
            DivergenceChoice::OverwriteLocal => {
                let target = self.tracking_ref();
                self.git.run(&["fetch", &self.remote]).await?;
                self.git.run(&["reset", "--hard", &target]).await?;
                info!(%target, "Local document replaced with remote");
                self.finish(SyncOutcome::OverwroteLocal)
            }
            DivergenceChoice::OverwriteRemote => {
                self.git
                    .run(&["push", "-f", &self.remote, &self.branch])
                    .await?;
                info!("Remote overwritten with local document");
                self.finish(SyncOutcome::OverwroteRemote)
            }
            DivergenceChoice::Cancel => Ok(SyncReport::new(SyncOutcome::Cancelled)),
        }
    }

    fn finish(&self, outcome: SyncOutcome) -> Result<SyncReport> {
        let mut report = SyncReport::new(outcome);
        report.document = Some(self.reload()?);
        Ok(report)
    }

    // ── Pull only ─────────────────────────────────────────────

    /// Commit pending changes and pull, without pushing.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` when git sync is not set up, otherwise the
    /// same errors as [`sync_now`](Self::sync_now) before its push step.
    pub async fn pull(&self) -> Result<SyncReport> {
        let _guard = lock_dir(self.store.dir()).await;
        if !self.is_initialized() {
            return Err(Error::NotInitialized {
                dir: self.store.dir().to_path_buf(),
            });
        }
        self.recover_interrupted().await?;

        let committed = self.commit_pending("Sync").await?;
        let conflict_resolved = self.pull_reconciling().await?;

        let mut report = self.finish(SyncOutcome::Completed)?;
        report.committed = committed;
        report.conflict_resolved = conflict_resolved;
        Ok(report)
    }

    // ── Background sync ───────────────────────────────────────

    /// Silent sync after a save. Never prompts.
    ///
    /// Pull and push failures are reported as `Deferred`; the local commit
    /// stays and the next sync picks it up. A pull that cannot be resolved
    /// is aborted so the repository is not left conflicted.
    ///
    /// # Errors
    ///
    /// Returns an error only if staging or committing fails.
    pub async fn auto_sync(&self) -> Result<AutoSyncOutcome> {
        let _guard = lock_dir(self.store.dir()).await;

        if !self.is_initialized() {
            return Ok(AutoSyncOutcome::Skipped {
                reason: SkipReason::NotConfigured,
            });
        }
        if self.is_conflicted() {
            debug!("Skipping auto-sync: repository is conflicted");
            return Ok(AutoSyncOutcome::Skipped {
                reason: SkipReason::Conflicted,
            });
        }
        if !self.has_pending_changes().await? {
            return Ok(AutoSyncOutcome::Skipped {
                reason: SkipReason::NoChanges,
            });
        }

        self.commit_pending("Auto-sync").await?;

        let conflict_resolved = match self.pull_rebase().await {
            Ok(_) => false,
            Err(e) if git::is_missing_remote_branch(&e) => false,
            Err(e) if git::is_conflict(&e) || self.is_conflicted() => {
                if !self.resolver().resolve().await {
                    self.abort_in_progress().await;
                    return Ok(AutoSyncOutcome::Deferred {
                        detail: "conflict needs manual resolution".to_string(),
                    });
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "Auto-sync pull failed");
                return Ok(AutoSyncOutcome::Deferred {
                    detail: git::diagnostics(&e),
                });
            }
        };

        match self
            .git
            .run(&["push", "-u", &self.remote, &self.branch])
            .await
        {
            Ok(_) => {
                debug!("Auto-sync pushed");
                Ok(AutoSyncOutcome::Pushed { conflict_resolved })
            }
            Err(e) => {
                debug!(error = %e, "Auto-sync push failed");
                Ok(AutoSyncOutcome::Deferred {
                    detail: git::diagnostics(&e),
                })
            }
        }
    }

    // ── Reconfiguration ───────────────────────────────────────

    /// Ask whether to change the remote or remove git sync, then do it.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen git or filesystem step fails.
    pub async fn reset_configuration(&self) -> Result<ResetOutcome> {
        let choice = {
            let options = ["Change remote URL", "Remove Git configuration completely", "Cancel"];
            match self.prompt.select(RESET_QUESTION, &options, 2) {
                0 => match self.prompt.input(NEW_REMOTE_QUESTION) {
                    Some(url) if !url.trim().is_empty() => ResetChoice::ChangeRemote(url),
                    _ => ResetChoice::Cancel,
                },
                1 => ResetChoice::RemoveConfiguration,
                _ => ResetChoice::Cancel,
            }
        };
        self.apply_reset(choice).await
    }

    /// Apply a reset choice. Removal still asks for confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the git or filesystem step fails.
    pub async fn apply_reset(&self, choice: ResetChoice) -> Result<ResetOutcome> {
        let _guard = lock_dir(self.store.dir()).await;
        if !self.is_initialized() {
            return Ok(ResetOutcome::NotConfigured);
        }

        match choice {
            ResetChoice::ChangeRemote(url) => {
                let url = url.trim().to_string();
                let set = self
                    .git
                    .run(&["remote", "set-url", &self.remote, &url])
                    .await;
                if let Err(e) = set {
                    debug!(error = %e, "set-url failed, adding remote");
                    self.git.run(&["remote", "add", &self.remote, &url]).await?;
                }
                info!(remote = %url, "Remote changed");
                Ok(ResetOutcome::RemoteChanged { url })
            }
            ResetChoice::RemoveConfiguration => {
                if !self.prompt.confirm(REMOVE_QUESTION, false) {
                    return Ok(ResetOutcome::Cancelled);
                }
                std::fs::remove_dir_all(self.store.dir().join(".git"))?;
                info!("Git sync removed");
                Ok(ResetOutcome::Removed)
            }
            ResetChoice::Cancel => Ok(ResetOutcome::Cancelled),
        }
    }

    // ── Inspection ────────────────────────────────────────────

    /// URL of the sync remote, if configured.
    pub async fn remote_url(&self) -> Option<String> {
        self.git
            .run(&["remote", "get-url", &self.remote])
            .await
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// The identity this directory syncs under: owner of a GitHub remote.
    pub async fn remote_username(&self) -> Option<String> {
        if !self.is_initialized() {
            return None;
        }
        self.remote_url()
            .await
            .and_then(|url| git::username_from_remote(&url))
    }

    /// Fetch and report how local and remote relate.
    ///
    /// A failing fetch is logged; the counts then reflect the last fetch.
    ///
    /// # Errors
    ///
    /// Returns an error if `git status` fails.
    pub async fn status(&self) -> Result<SyncStatus> {
        let _guard = lock_dir(self.store.dir()).await;
        if !self.is_initialized() {
            return Ok(SyncStatus::default());
        }

        let conflicted = self.is_conflicted();
        let pending_changes = self.has_pending_changes().await?;

        if let Err(e) = self.git.run(&["fetch", &self.remote, &self.branch]).await {
            warn!(error = %e, "Fetch failed, status may be stale");
        }

        let range = format!("HEAD...{}", self.tracking_ref());
        let (ahead, behind) = match self
            .git
            .run(&["rev-list", "--left-right", "--count", &range])
            .await
        {
            Ok(out) => parse_counts(&out).unwrap_or_default(),
            Err(e) => {
                debug!(error = %e, "No upstream to compare against");
                (0, 0)
            }
        };

        let remote_url = self.remote_url().await;
        let username = remote_url.as_deref().and_then(git::username_from_remote);

        Ok(SyncStatus {
            initialized: true,
            conflicted,
            pending_changes,
            ahead,
            behind,
            remote_url,
            username,
        })
    }

    // ── Load ──────────────────────────────────────────────────

    /// Fetch the remote document and merge it into the working copy
    /// without committing.
    ///
    /// Returns whether the local file changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the local document is malformed or cannot be
    /// written. Network and remote-side failures are not errors.
    pub async fn prefetch_and_merge(&self) -> Result<bool> {
        let _guard = lock_dir(self.store.dir()).await;
        if !self.is_initialized() || self.is_conflicted() {
            return Ok(false);
        }

        if let Err(e) = self.git.run(&["fetch", &self.remote, &self.branch]).await {
            debug!(error = %e, "Pre-fetch skipped");
            return Ok(false);
        }

        let spec = format!("{}:{}", self.tracking_ref(), self.store.file_name());
        let text = match self.git.run(&["show", &spec]).await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Remote has no document yet");
                return Ok(false);
            }
        };
        let remote = match Document::parse(&text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Remote document is malformed, not merging");
                return Ok(false);
            }
        };

        let local = self.store.try_load()?;
        let changed = self.store.save(merge(&local, &remote))?;
        if changed {
            info!("Merged remote changes into local document");
        }
        Ok(changed)
    }

    /// Pre-fetch, then load the document for display.
    pub async fn load_document(&self) -> LoadedDocument {
        if let Err(e) = self.prefetch_and_merge().await {
            warn!(error = %e, "Pre-fetch merge failed");
        }
        LoadedDocument {
            document: self.store.load(),
            username: self.remote_username().await,
        }
    }
}

/// Parse `rev-list --left-right --count` output (`"<ahead>\t<behind>"`).
fn parse_counts(out: &str) -> Option<(u32, u32)> {
    let mut parts = out.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}
