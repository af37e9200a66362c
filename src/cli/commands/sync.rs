//! Git sync commands: init, sync, pull, status, reset.

use colored::Colorize;
use serde::Serialize;

use super::{Workspace, print_json, runtime};
use crate::error::Result;
use crate::sync::{ResetChoice, ResetOutcome, SyncOutcome, SyncReport};

#[derive(Serialize)]
struct InitOutput<'a> {
    initialized: bool,
    dir: &'a str,
}

/// Execute `ct init [--remote <url>]`.
///
/// # Errors
///
/// Returns an error if a git setup step fails.
pub fn init(ws: &Workspace, remote: Option<&str>, json: bool) -> Result<()> {
    let driver = ws.driver();
    let already = driver.is_initialized();
    let rt = runtime()?;
    let initialized = rt.block_on(async {
        match remote {
            Some(url) => driver.initialize(url.trim()).await.map(|_| true),
            None => driver.ensure_initialized().await,
        }
    })?;

    let dir = ws.store.dir().display().to_string();
    if json {
        return print_json(&InitOutput {
            initialized,
            dir: &dir,
        });
    }
    if already {
        println!("{} {dir}", "Git sync already configured in".yellow());
    } else if initialized {
        println!("{} {dir}", "Git sync initialized in".green());
    } else {
        println!("{}", "Git sync not configured".yellow());
    }
    Ok(())
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    let message = match report.outcome {
        SyncOutcome::Completed => "Sync complete".green(),
        SyncOutcome::OverwroteLocal => "Local document replaced with remote".yellow(),
        SyncOutcome::OverwroteRemote => "Remote overwritten with local document".yellow(),
        SyncOutcome::Cancelled => "Sync cancelled".yellow(),
        SyncOutcome::NotConfigured => "Git sync not configured".yellow(),
    };
    println!("{message}");
    if report.conflict_resolved {
        println!("  {}", "Conflicts auto-resolved with JSON merge".dimmed());
    }
    if let Some(doc) = &report.document {
        println!(
            "  {}",
            format!(
                "{} entries, {} subscriptions",
                doc.items.len(),
                doc.subscriptions.len()
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Execute `ct sync`.
///
/// # Errors
///
/// Returns the sync failure (pull, conflict, or git error).
pub fn sync(ws: &Workspace, json: bool) -> Result<()> {
    let report = runtime()?.block_on(ws.driver().sync_now())?;
    print_report(&report, json)
}

/// Execute `ct pull`.
///
/// # Errors
///
/// Returns `NotInitialized` or the pull failure.
pub fn pull(ws: &Workspace, json: bool) -> Result<()> {
    let report = runtime()?.block_on(ws.driver().pull())?;
    print_report(&report, json)
}

/// Execute `ct status`.
///
/// # Errors
///
/// Returns an error if git status cannot be queried.
pub fn status(ws: &Workspace, json: bool) -> Result<()> {
    let status = runtime()?.block_on(ws.driver().status())?;

    if json {
        return print_json(&status);
    }
    if !status.initialized {
        println!("{}", "Git sync not configured. Run `ct init`.".yellow());
        return Ok(());
    }

    println!(
        "{} {}",
        "Remote:".bold(),
        status.remote_url.as_deref().unwrap_or("(none)")
    );
    if let Some(username) = &status.username {
        println!("{} {username}", "User:".bold());
    }
    if status.conflicted {
        println!("{}", "Unfinished merge or rebase; run `ct sync` to recover".red());
    }
    if status.pending_changes {
        println!("{}", "Uncommitted changes".yellow());
    }
    println!(
        "{} ahead, {} behind",
        status.ahead.to_string().bold(),
        status.behind.to_string().bold()
    );
    Ok(())
}

/// Execute `ct reset [--remote <url> | --remove]`.
///
/// # Errors
///
/// Returns an error if the git or filesystem step fails.
pub fn reset(ws: &Workspace, remote: Option<&str>, remove: bool, json: bool) -> Result<()> {
    let driver = ws.driver();
    let rt = runtime()?;
    let outcome = rt.block_on(async {
        match (remote, remove) {
            (Some(url), _) => driver.apply_reset(ResetChoice::ChangeRemote(url.to_string())).await,
            (None, true) => driver.apply_reset(ResetChoice::RemoveConfiguration).await,
            (None, false) => driver.reset_configuration().await,
        }
    })?;

    if json {
        return print_json(&outcome);
    }
    match outcome {
        ResetOutcome::RemoteChanged { url } => println!("{} {url}", "Remote set to".green()),
        ResetOutcome::Removed => println!("{}", "Git sync removed; the document was kept".green()),
        ResetOutcome::Cancelled => println!("{}", "Cancelled".yellow()),
        ResetOutcome::NotConfigured => println!("{}", "Git sync not configured".yellow()),
    }
    Ok(())
}
