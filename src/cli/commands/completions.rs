//! Shell completions command implementation.

use crate::cli::{Cli, Shell};
use crate::error::Result;
use clap::CommandFactory;
use clap_complete::{generate, shells};
use std::io;

/// Generate shell completions for the specified shell.
///
/// # Errors
///
/// Infallible today; returns `Result` like every other command.
pub fn execute(shell: &Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let out = &mut io::stdout();

    match shell {
        Shell::Bash => generate(shells::Bash, &mut cmd, &name, out),
        Shell::Zsh => generate(shells::Zsh, &mut cmd, &name, out),
        Shell::Fish => generate(shells::Fish, &mut cmd, &name, out),
        Shell::PowerShell => generate(shells::PowerShell, &mut cmd, &name, out),
        Shell::Elvish => generate(shells::Elvish, &mut cmd, &name, out),
    }

    Ok(())
}
