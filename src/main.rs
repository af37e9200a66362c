//! cmdtrack CLI entry point.

use clap::Parser;
use ct::cli::commands::{self, Workspace};
use ct::cli::{Cli, Commands};
use ct::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,reqwest=info,hyper_util=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    // Commands that never touch the storage directory
    match &cli.command {
        Commands::Version => return commands::version::execute(json),
        Commands::Completions { shell } => return commands::completions::execute(shell),
        _ => {}
    }

    let ws = Workspace::open(cli.dir.as_deref(), cli.yes)?;

    match &cli.command {
        // Entries
        Commands::Show { kind, offline } => {
            commands::document::show(&ws, kind.as_ref(), *offline, json)
        }
        Commands::Add(args) => commands::document::add(&ws, args, json),
        Commands::Edit(args) => commands::document::edit(&ws, args, json),
        Commands::Rm { id } => commands::document::remove(&ws, id, json),
        Commands::Pin { id } => commands::document::set_pinned(&ws, id, true, json),
        Commands::Unpin { id } => commands::document::set_pinned(&ws, id, false, json),
        Commands::Save { file } => commands::document::save(&ws, file, json),

        // Peers
        Commands::Subscribe { url } => commands::subscription::subscribe(&ws, url, json),
        Commands::Unsubscribe {
            id,
            remove_items,
            archive,
        } => commands::subscription::unsubscribe(&ws, id, *remove_items, *archive, json),
        Commands::Refresh => commands::subscription::refresh(&ws, json),
        Commands::Peers => commands::subscription::peers(&ws, json),

        // Git sync
        Commands::Sync => commands::sync::sync(&ws, json),
        Commands::Pull => commands::sync::pull(&ws, json),
        Commands::Status => commands::sync::status(&ws, json),
        Commands::Reset { remote, remove } => {
            commands::sync::reset(&ws, remote.as_deref(), *remove, json)
        }
        Commands::Init { remote } => commands::sync::init(&ws, remote.as_deref(), json),

        Commands::Version | Commands::Completions { .. } => Ok(()),
    }
}
