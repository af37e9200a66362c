//! Entry commands: show, add, edit, rm, pin, unpin, save.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::{Workspace, print_json, runtime};
use crate::cli::{AddArgs, EditArgs};
use crate::error::{Error, Result};
use crate::model::{Document, Entry, EntryKind, Subscription};

#[derive(Serialize)]
struct ShowOutput<'a> {
    username: Option<&'a str>,
    pinned: usize,
    items: Vec<EntryView<'a>>,
    subscriptions: &'a [Subscription],
}

/// An entry with its display defaults resolved.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryView<'a> {
    #[serde(flatten)]
    entry: &'a Entry,
    display_icon: &'a str,
    display_color: &'a str,
}

#[derive(Serialize)]
struct EntryOutput<'a> {
    action: &'a str,
    entry: &'a Entry,
}

/// Execute `ct show`.
///
/// # Errors
///
/// Returns an error if output serialization fails.
pub fn show(ws: &Workspace, kind: Option<&EntryKind>, offline: bool, json: bool) -> Result<()> {
    let rt = runtime()?;
    let driver = ws.driver();
    let loaded = rt.block_on(async {
        if offline {
            crate::sync::LoadedDocument {
                document: ws.store.load(),
                username: driver.remote_username().await,
            }
        } else {
            driver.load_document().await
        }
    });

    let doc = &loaded.document;
    let mut items: Vec<&Entry> = doc
        .items
        .iter()
        .filter(|e| kind.is_none_or(|k| &e.kind == k))
        .collect();
    // Pinned first, otherwise document order.
    items.sort_by_key(|e| !e.pinned);

    if json {
        return print_json(&ShowOutput {
            username: loaded.username.as_deref(),
            pinned: doc.pinned_count(),
            items: items
                .into_iter()
                .map(|entry| EntryView {
                    entry,
                    display_icon: entry.effective_icon(),
                    display_color: entry.effective_color(),
                })
                .collect(),
            subscriptions: &doc.subscriptions,
        });
    }

    if let Some(username) = &loaded.username {
        println!("{} {}", "Syncing as".dimmed(), username.bold());
    }
    if doc.pinned_count() > 0 {
        println!("{}", format!("{} pinned", doc.pinned_count()).dimmed());
    }

    for category in [EntryKind::Commands, EntryKind::Prompts] {
        if kind.is_some_and(|k| *k != category) {
            continue;
        }
        let group: Vec<&&Entry> = items.iter().filter(|e| e.kind == category).collect();
        println!("{}", format!("{} ({})", title(&category), group.len()).cyan().bold());
        if group.is_empty() {
            println!("  {}", "(none)".dimmed());
        }
        for entry in group {
            print_entry(entry);
        }
    }

    let other: Vec<&&Entry> = items
        .iter()
        .filter(|e| matches!(e.kind, EntryKind::Other(_)))
        .collect();
    if !other.is_empty() {
        println!("{}", format!("Other ({})", other.len()).cyan().bold());
        for entry in other {
            print_entry(entry);
        }
    }

    if !doc.subscriptions.is_empty() {
        println!("{}", "Subscriptions".magenta().bold());
        for sub in &doc.subscriptions {
            println!(
                "  {} {} {} {}",
                sub.id.dimmed(),
                sub.username.bold(),
                sub.url,
                format!("[{}]", sub.status).dimmed()
            );
        }
    }
    Ok(())
}

fn title(kind: &EntryKind) -> &'static str {
    match kind {
        EntryKind::Commands => "Commands",
        EntryKind::Prompts => "Prompts",
        EntryKind::Other(_) => "Other",
    }
}

fn print_entry(entry: &Entry) {
    let pin = if entry.pinned { "★" } else { " " };
    let origin = entry
        .source
        .as_deref()
        .filter(|_| !entry.is_local())
        .map(|s| format!(" [{s}]"))
        .unwrap_or_default();
    println!(
        "  {pin} {} {} {}{}  {}",
        entry.id.dimmed(),
        format!("[{}]", entry.effective_icon()).dimmed(),
        entry.name.bold(),
        origin.dimmed(),
        entry.content
    );
    if let Some(notes) = entry.notes.as_deref().filter(|n| !n.is_empty()) {
        println!("      {}", notes.dimmed());
    }
}

fn report(action: &str, entry: &Entry, json: bool) -> Result<()> {
    if json {
        return print_json(&EntryOutput { action, entry });
    }
    println!("{} {} ({})", action.green(), entry.name.bold(), entry.id.dimmed());
    Ok(())
}

/// Run a mutation against one entry, then auto-sync.
fn mutate_entry(ws: &Workspace, id: &str, f: impl FnOnce(&mut Entry)) -> Result<Entry> {
    let rt = runtime()?;
    rt.block_on(async {
        let entry = ws
            .store
            .update(|doc| {
                let entry = doc
                    .entry_mut(id)
                    .ok_or_else(|| Error::EntryNotFound { id: id.to_string() })?;
                f(entry);
                Ok(entry.clone())
            })
            .await?;
        ws.after_save().await;
        Ok(entry)
    })
}

/// Execute `ct add`.
///
/// # Errors
///
/// Returns an error if name or content is empty or the document cannot be saved.
pub fn add(ws: &Workspace, args: &AddArgs, json: bool) -> Result<()> {
    if args.name.trim().is_empty() || args.content.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "name and content are required".to_string(),
        ));
    }

    let mut entry = Entry::new_local(args.kind.clone(), args.name.trim(), args.content.as_str());
    entry.notes = args.notes.clone().filter(|n| !n.is_empty());
    entry.icon = args.icon.clone().filter(|i| !i.is_empty());
    entry.color = args.color.clone().filter(|c| !c.is_empty());

    let rt = runtime()?;
    let entry = rt.block_on(async {
        let entry = ws
            .store
            .update(|doc| {
                doc.items.push(entry.clone());
                Ok(entry)
            })
            .await?;
        ws.after_save().await;
        Ok::<_, Error>(entry)
    })?;

    report("Added", &entry, json)
}

/// Execute `ct edit`.
///
/// # Errors
///
/// Returns `EntryNotFound` for an unknown id.
pub fn edit(ws: &Workspace, args: &EditArgs, json: bool) -> Result<()> {
    let blank_to_none = |v: &Option<String>| v.clone().map(|s| Some(s).filter(|s| !s.is_empty()));

    if args.name.as_deref().is_some_and(|n| n.trim().is_empty())
        || args.content.as_deref().is_some_and(|c| c.trim().is_empty())
    {
        return Err(Error::InvalidArgument(
            "name and content cannot be empty".to_string(),
        ));
    }

    let entry = mutate_entry(ws, &args.id, |entry| {
        if let Some(name) = &args.name {
            entry.name = name.trim().to_string();
        }
        if let Some(content) = &args.content {
            entry.content.clone_from(content);
        }
        if let Some(notes) = blank_to_none(&args.notes) {
            entry.notes = notes;
        }
        if let Some(icon) = blank_to_none(&args.icon) {
            entry.icon = icon;
        }
        if let Some(color) = blank_to_none(&args.color) {
            entry.color = color;
        }
    })?;

    report("Updated", &entry, json)
}

/// Execute `ct pin` / `ct unpin`.
///
/// # Errors
///
/// Returns `EntryNotFound` for an unknown id.
pub fn set_pinned(ws: &Workspace, id: &str, pinned: bool, json: bool) -> Result<()> {
    let entry = mutate_entry(ws, id, |entry| entry.pinned = pinned)?;
    report(if pinned { "Pinned" } else { "Unpinned" }, &entry, json)
}

/// Execute `ct rm`.
///
/// # Errors
///
/// Returns `EntryNotFound` for an unknown id.
pub fn remove(ws: &Workspace, id: &str, json: bool) -> Result<()> {
    let rt = runtime()?;
    let entry = rt.block_on(async {
        let entry = ws
            .store
            .update(|doc| {
                let pos = doc
                    .items
                    .iter()
                    .position(|e| e.id == id)
                    .ok_or_else(|| Error::EntryNotFound { id: id.to_string() })?;
                Ok(doc.items.remove(pos))
            })
            .await?;
        ws.after_save().await;
        Ok::<_, Error>(entry)
    })?;

    report("Deleted", &entry, json)
}

#[derive(Serialize)]
struct SaveOutput {
    items: usize,
    subscriptions: usize,
}

/// Execute `ct save <file>`: replace the document's contents.
///
/// A legacy array file replaces only the entries; subscriptions are kept.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a document.
pub fn save(ws: &Workspace, file: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    let incoming: crate::model::DocumentFile = serde_json::from_str(&text)?;

    let rt = runtime()?;
    let (items, subscriptions) = rt.block_on(async {
        let counts = ws
            .store
            .update(|doc| {
                *doc = match incoming {
                    crate::model::DocumentFile::Legacy(items) => Document {
                        items,
                        subscriptions: std::mem::take(&mut doc.subscriptions),
                    },
                    crate::model::DocumentFile::Current(replacement) => replacement,
                };
                Ok((doc.items.len(), doc.subscriptions.len()))
            })
            .await?;
        ws.after_save().await;
        Ok::<_, Error>(counts)
    })?;

    if json {
        return print_json(&SaveOutput {
            items,
            subscriptions,
        });
    }
    println!(
        "{} {items} entries, {subscriptions} subscriptions",
        "Saved".green()
    );
    Ok(())
}
