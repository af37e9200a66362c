//! User prompts.
//!
//! The sync driver and subscription manager ask the user to choose between
//! options (confirm a reset, pick a divergence recovery, enter a remote URL)
//! through the [`Prompt`] trait. [`TerminalPrompt`] asks on stderr and reads
//! stdin; without a terminal, or with `--yes`, it answers with each
//! question's default.

use std::io::{IsTerminal, Write};

/// Interactive questions.
pub trait Prompt {
    /// Ask a yes/no question.
    fn confirm(&self, message: &str, default: bool) -> bool;

    /// Ask for a line of text. `None` when the user gives nothing.
    fn input(&self, message: &str) -> Option<String>;

    /// Ask the user to pick one of `options`. Returns its index.
    fn select(&self, message: &str, options: &[&str], default: usize) -> usize;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    use_defaults: bool,
}

impl TerminalPrompt {
    /// Create a prompt. With `assume_defaults`, or when stdin is not a
    /// terminal, every question is answered with its default.
    #[must_use]
    pub fn new(assume_defaults: bool) -> Self {
        Self {
            use_defaults: assume_defaults || !std::io::stdin().is_terminal(),
        }
    }

    fn read_line(&self, question: &str) -> Option<String> {
        if self.use_defaults {
            return None;
        }
        eprint!("{question} ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, message: &str, default: bool) -> bool {
        let suffix = if default { "[Y/n]" } else { "[y/N]" };
        match self.read_line(&format!("{message} {suffix}")) {
            Some(answer) => match answer.to_lowercase().as_str() {
                "" => default,
                "y" | "yes" => true,
                _ => false,
            },
            None => default,
        }
    }

    fn input(&self, message: &str) -> Option<String> {
        self.read_line(&format!("{message}:"))
            .filter(|s| !s.is_empty())
    }

    fn select(&self, message: &str, options: &[&str], default: usize) -> usize {
        if self.use_defaults {
            return default;
        }
        eprintln!("{message}");
        for (i, option) in options.iter().enumerate() {
            let marker = if i == default { "*" } else { " " };
            eprintln!(" {marker} {}) {option}", i + 1);
        }
        self.read_line(&format!("Choose 1-{}:", options.len()))
            .and_then(|answer| answer.parse::<usize>().ok())
            .filter(|n| (1..=options.len()).contains(n))
            .map_or(default, |n| n - 1)
    }
}
