//! Subscription commands: subscribe, unsubscribe, refresh, peers.

use colored::Colorize;

use super::{Workspace, print_json, runtime};
use crate::error::Result;
use crate::model::SubscriptionStatus;
use crate::peer::Removal;

/// Execute `ct subscribe <url>`.
///
/// # Errors
///
/// Returns an error if the URL is invalid, already subscribed, or the peer
/// cannot be fetched.
pub fn subscribe(ws: &Workspace, url: &str, json: bool) -> Result<()> {
    let rt = runtime()?;
    let report = rt.block_on(async {
        let report = ws.subscriptions().add(url).await?;
        ws.after_save().await;
        Ok::<_, crate::Error>(report)
    })?;

    if json {
        return print_json(&report);
    }
    println!(
        "{} {} ({} added, {} updated)",
        "Subscribed to".green(),
        report.username.bold(),
        report.counts.added,
        report.counts.updated
    );
    if report.counts.skipped > 0 {
        println!(
            "  {}",
            format!(
                "{} skipped: you already have entries with those names",
                report.counts.skipped
            )
            .dimmed()
        );
    }
    Ok(())
}

/// Execute `ct unsubscribe <id>`.
///
/// Without `--remove-items` or `--archive` the user is asked.
///
/// # Errors
///
/// Returns `SubscriptionNotFound` for an unknown id.
pub fn unsubscribe(
    ws: &Workspace,
    id: &str,
    remove_items: bool,
    archive: bool,
    json: bool,
) -> Result<()> {
    let manager = ws.subscriptions();
    let rt = runtime()?;
    let report = rt.block_on(async {
        let report = match (remove_items, archive) {
            (true, _) => manager.remove(id, Removal::RemoveItems).await?,
            (_, true) => manager.remove(id, Removal::Archive).await?,
            _ => manager.remove_with_prompt(id, &ws.prompt()).await?,
        };
        if report.disposition != Removal::Cancel {
            ws.after_save().await;
        }
        Ok::<_, crate::Error>(report)
    })?;

    if json {
        return print_json(&report);
    }
    match report.disposition {
        Removal::Cancel => println!("{}", "Cancelled".yellow()),
        Removal::RemoveItems => println!(
            "{} {} and removed {} entries",
            "Unsubscribed from".green(),
            report.username.bold(),
            report.affected
        ),
        Removal::Archive => println!(
            "{} {} and archived {} entries",
            "Unsubscribed from".green(),
            report.username.bold(),
            report.affected
        ),
    }
    Ok(())
}

/// Execute `ct refresh`.
///
/// # Errors
///
/// Returns an error only if the local document cannot be read or written.
pub fn refresh(ws: &Workspace, json: bool) -> Result<()> {
    let rt = runtime()?;
    let report = rt.block_on(async {
        let report = ws.subscriptions().refresh_all().await?;
        ws.after_save().await;
        Ok::<_, crate::Error>(report)
    })?;

    if json {
        return print_json(&report);
    }
    println!(
        "{} {} peers ({} added, {} updated)",
        "Refreshed".green(),
        report.synced,
        report.counts.added,
        report.counts.updated
    );
    for username in &report.unreachable {
        println!("  {} {}", "unreachable:".red(), username);
    }
    Ok(())
}

/// Execute `ct peers`.
///
/// # Errors
///
/// Returns an error if the local document cannot be read.
pub fn peers(ws: &Workspace, json: bool) -> Result<()> {
    let listings = ws.subscriptions().peer_repositories()?;

    if json {
        return print_json(&listings);
    }
    if listings.is_empty() {
        println!("{}", "No subscriptions. Add one with `ct subscribe <url>`.".dimmed());
        return Ok(());
    }
    for listing in &listings {
        let sub = &listing.subscription;
        let status = match sub.status {
            SubscriptionStatus::Active => sub.status.to_string().green(),
            SubscriptionStatus::Unreachable => sub.status.to_string().red(),
        };
        println!(
            "{} {} {} {}",
            sub.id.dimmed(),
            listing.full_name.as_deref().unwrap_or(&sub.url).bold(),
            status,
            format!("synced {}", sub.last_synced).dimmed()
        );
    }
    Ok(())
}
