//! Git process seam.
//!
//! Every version-control step goes through [`Git::run`], executed with the
//! storage directory as working directory. Failures carry git's own
//! diagnostic text so callers can classify them (conflict, unrelated
//! histories, rejected push) and users can read them.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Runs git subcommands in one working tree.
///
/// The trait is implemented by [`GitCli`] and by in-memory fakes in tests.
pub trait Git: Send + Sync {
    /// The working tree (the storage directory).
    fn workdir(&self) -> &Path;

    /// Run `git <args>` and return stdout.
    ///
    /// A nonzero exit is `Error::Git` with the combined stderr/stdout text.
    fn run(&self, args: &[&str]) -> impl Future<Output = Result<String>> + Send;
}

/// Git via the `git` executable on `PATH`.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
}

impl GitCli {
    /// Create a runner for the given working tree.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

impl Git for GitCli {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.join(" ");

        std::fs::create_dir_all(&self.workdir).map_err(|e| Error::Git {
            command: command.clone(),
            stderr: format!(
                "failed to create storage directory {}: {e}",
                self.workdir.display()
            ),
        })?;

        debug!(%command, cwd = %self.workdir.display(), "Running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::Git {
                command: command.clone(),
                stderr: format!("failed to run git: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        let detail = if detail.is_empty() {
            format!("git exited with {}", output.status)
        } else {
            detail
        };

        debug!(%command, %detail, "Git failed");
        Err(Error::Git {
            command,
            stderr: detail,
        })
    }
}

// ── Repository state ──────────────────────────────────────────

/// Whether the directory is a git working tree.
#[must_use]
pub fn is_repository(dir: &Path) -> bool {
    dir.join(".git").exists()
}

/// Whether an unfinished merge is in progress.
#[must_use]
pub fn merge_in_progress(dir: &Path) -> bool {
    dir.join(".git").join("MERGE_HEAD").exists()
}

/// Whether an unfinished rebase is in progress.
#[must_use]
pub fn rebase_in_progress(dir: &Path) -> bool {
    let git_dir = dir.join(".git");
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
}

/// Whether a merge or rebase was left unfinished.
#[must_use]
pub fn operation_in_progress(dir: &Path) -> bool {
    merge_in_progress(dir) || rebase_in_progress(dir)
}

// ── Failure classification ────────────────────────────────────

fn diagnostics_contain(err: &Error, needles: &[&str]) -> bool {
    err.git_stderr()
        .is_some_and(|text| needles.iter().any(|n| text.contains(n)))
}

/// Pull refused because local and remote share no history.
#[must_use]
pub fn is_unrelated_histories(err: &Error) -> bool {
    diagnostics_contain(err, &["unrelated histories"])
}

/// Pull stopped on a textual conflict.
#[must_use]
pub fn is_conflict(err: &Error) -> bool {
    diagnostics_contain(err, &["CONFLICT", "Merge conflict", "could not apply"])
}

/// The remote has no such branch yet (e.g. a freshly created repository).
#[must_use]
pub fn is_missing_remote_branch(err: &Error) -> bool {
    diagnostics_contain(err, &["couldn't find remote ref", "could not find remote ref"])
}

/// Push rejected because the remote moved on.
#[must_use]
pub fn is_non_fast_forward(err: &Error) -> bool {
    diagnostics_contain(err, &["[rejected]", "non-fast-forward", "fetch first"])
}

/// `rebase --continue` found nothing left to commit.
#[must_use]
pub fn is_empty_rebase_step(err: &Error) -> bool {
    diagnostics_contain(err, &["No changes", "nothing to commit"])
}

/// Human-readable detail for an error, preferring git's own output.
#[must_use]
pub fn diagnostics(err: &Error) -> String {
    err.git_stderr()
        .map_or_else(|| err.to_string(), str::to_string)
}

/// Owner name from a GitHub remote (`https://github.com/<owner>/...` or
/// `git@github.com:<owner>/...`), lowercased.
#[must_use]
pub fn username_from_remote(remote_url: &str) -> Option<String> {
    let idx = remote_url.find("github.com")?;
    let rest = &remote_url[idx + "github.com".len()..];
    let rest = rest.strip_prefix(':').or_else(|| rest.strip_prefix('/'))?;
    let (owner, _) = rest.split_once('/')?;
    if owner.is_empty() {
        return None;
    }
    Some(owner.to_lowercase())
}
