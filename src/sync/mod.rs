//! Git-backed sync of the document.
//!
//! The storage directory is a git working tree whose only tracked file is the
//! document. This module keeps it in step with a remote:
//!
//! - **Git**: process seam for every git invocation
//! - **Merge**: pure semantic merge of two documents
//! - **Conflict**: turns a textual conflict into a merged document and
//!   completes the interrupted merge or rebase
//! - **Driver**: the sync state machine (setup, sync now, auto-sync, pull,
//!   reset, status, pre-fetch merge)
//!
//! # Architecture
//!
//! ```text
//!   save ──► auto_sync ─┐
//!                       ├─► commit ─► pull --rebase ─► push
//!   ct sync ─► sync_now ┘                 │              │
//!                               conflict? ▼     rejected? ▼
//!                             ConflictResolver     prompt choice
//! ```

mod conflict;
mod driver;
mod git;
mod merge;
mod types;

pub use conflict::{ConflictResolver, MERGE_COMMIT_MESSAGE, has_conflict_markers, split_conflict};
pub use driver::SyncDriver;
pub use git::{Git, GitCli, is_repository, operation_in_progress, username_from_remote};
pub use merge::merge;
pub use types::{
    AutoSyncOutcome, DivergenceChoice, LoadedDocument, ResetChoice, ResetOutcome,
    SkipReason, SyncOutcome, SyncReport, SyncStatus,
};
