//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::model::EntryKind;

pub mod commands;

/// cmdtrack - personal commands and prompts, synced through git
#[derive(Parser, Debug)]
#[command(name = "ct", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Storage directory (default: ~/.cmdtrack)
    #[arg(long, global = true, env = "CT_DIR")]
    pub dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Never prompt; take the non-destructive answer to every question
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show entries and subscriptions (merges remote changes first)
    Show {
        /// Only show one category (commands, prompts)
        #[arg(long = "type", value_parser = parse_kind)]
        kind: Option<EntryKind>,

        /// Skip fetching the remote before showing
        #[arg(long)]
        offline: bool,
    },

    /// Add a local entry
    Add(AddArgs),

    /// Edit an entry
    Edit(EditArgs),

    /// Delete an entry
    Rm {
        /// Entry id
        id: String,
    },

    /// Pin an entry
    Pin {
        /// Entry id
        id: String,
    },

    /// Unpin an entry
    Unpin {
        /// Entry id
        id: String,
    },

    /// Replace the document with a JSON file (array or object form)
    Save {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Subscribe to a peer's GitHub repository
    Subscribe {
        /// Repository URL, e.g. https://github.com/alice/commands
        url: String,
    },

    /// Remove a subscription
    Unsubscribe {
        /// Subscription id (see `ct peers`)
        id: String,

        /// Delete the peer's entries
        #[arg(long, conflicts_with = "archive")]
        remove_items: bool,

        /// Keep the peer's entries, marked as archived
        #[arg(long)]
        archive: bool,
    },

    /// Re-fetch every subscription
    Refresh,

    /// Commit, pull, and push
    Sync,

    /// Commit and pull without pushing
    Pull,

    /// Show git sync status
    Status,

    /// Change the remote or remove git sync
    Reset {
        /// New remote URL
        #[arg(long, conflicts_with = "remove")]
        remote: Option<String>,

        /// Remove git sync (keeps the document)
        #[arg(long)]
        remove: bool,
    },

    /// Set up git sync for the storage directory
    Init {
        /// Remote URL (prompted for when omitted)
        #[arg(long)]
        remote: Option<String>,
    },

    /// List subscribed peer repositories
    Peers,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

fn parse_kind(s: &str) -> std::result::Result<EntryKind, String> {
    EntryKind::parse_known(s).ok_or_else(|| format!("unknown type '{s}' (expected commands or prompts)"))
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Category: commands or prompts
    #[arg(value_parser = parse_kind)]
    pub kind: EntryKind,

    /// Display name
    pub name: String,

    /// The command or prompt text
    pub content: String,

    /// Free-form notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Icon token
    #[arg(long)]
    pub icon: Option<String>,

    /// Color token
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Entry id
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub content: Option<String>,

    /// New notes (empty string clears)
    #[arg(long)]
    pub notes: Option<String>,

    /// New icon (empty string clears)
    #[arg(long)]
    pub icon: Option<String>,

    /// New color (empty string clears)
    #[arg(long)]
    pub color: Option<String>,
}
