//! Sync result and choice types.

use serde::Serialize;

use crate::model::Document;

/// How a full sync ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Pulled and pushed.
    Completed,
    /// Push was rejected; local state was replaced by the remote.
    OverwroteLocal,
    /// Push was rejected; the remote was force-pushed.
    OverwroteRemote,
    /// The user declined to continue.
    Cancelled,
    /// Git sync is not set up and the user declined to set it up.
    NotConfigured,
}

/// Result of [`SyncDriver::sync_now`](super::SyncDriver::sync_now) and
/// [`SyncDriver::pull`](super::SyncDriver::pull).
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    /// A local commit was created for pending changes.
    pub committed: bool,
    /// A textual conflict was settled by the JSON merge.
    pub conflict_resolved: bool,
    /// The document as it stands after the operation.
    #[serde(skip)]
    pub document: Option<Document>,
}

impl SyncReport {
    pub(crate) fn new(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            committed: false,
            conflict_resolved: false,
            document: None,
        }
    }
}

/// Why a background sync did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotConfigured,
    Conflicted,
    NoChanges,
}

/// Result of a background sync after a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AutoSyncOutcome {
    Skipped { reason: SkipReason },
    /// Changes committed and pushed.
    Pushed { conflict_resolved: bool },
    /// Changes committed locally; pull or push failed and is left for the
    /// next sync.
    Deferred { detail: String },
}

/// Recovery when the remote rejected a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceChoice {
    OverwriteLocal,
    OverwriteRemote,
    Cancel,
}

impl DivergenceChoice {
    pub const ALL: [Self; 3] = [Self::OverwriteLocal, Self::OverwriteRemote, Self::Cancel];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::OverwriteLocal => "Overwrite local with remote",
            Self::OverwriteRemote => "Overwrite remote with local",
            Self::Cancel => "Cancel",
        }
    }
}

/// Action chosen when reconfiguring git sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetChoice {
    ChangeRemote(String),
    RemoveConfiguration,
    Cancel,
}

/// Result of a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResetOutcome {
    RemoteChanged { url: String },
    Removed,
    Cancelled,
    NotConfigured,
}

/// Snapshot for `ct status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub initialized: bool,
    pub conflicted: bool,
    /// Document has uncommitted changes.
    pub pending_changes: bool,
    /// Local commits not on the remote branch.
    pub ahead: u32,
    /// Remote commits not yet pulled.
    pub behind: u32,
    pub remote_url: Option<String>,
    pub username: Option<String>,
}

/// Document as loaded for display, with the identity it syncs under.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    /// Owner of the sync remote, when it is a GitHub repository.
    pub username: Option<String>,
}
