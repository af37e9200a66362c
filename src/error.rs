//! Error types for the cmdtrack CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=repository, 3=not_found, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Version-control failures keep the tool's own diagnostic text so the user
//! sees why git refused, not just that it did.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cmdtrack operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Repository (exit 2)
    NotInitialized,

    // Not Found (exit 3)
    EntryNotFound,
    SubscriptionNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidUrl,
    AlreadySubscribed,

    // Conflict (exit 5)
    Conflicted,
    ManualIntervention,

    // Sync (exit 6)
    GitError,
    SyncError,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Peer (exit 9)
    PeerUnreachable,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::EntryNotFound => "ENTRY_NOT_FOUND",
            Self::SubscriptionNotFound => "SUBSCRIPTION_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidUrl => "INVALID_URL",
            Self::AlreadySubscribed => "ALREADY_SUBSCRIBED",
            Self::Conflicted => "CONFLICTED",
            Self::ManualIntervention => "MANUAL_INTERVENTION",
            Self::GitError => "GIT_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::PeerUnreachable => "PEER_UNREACHABLE",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized => 2,
            Self::EntryNotFound | Self::SubscriptionNotFound => 3,
            Self::InvalidArgument | Self::InvalidUrl | Self::AlreadySubscribed => 4,
            Self::Conflicted | Self::ManualIntervention => 5,
            Self::GitError | Self::SyncError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::PeerUnreachable => 9,
        }
    }

    /// Whether retrying the same command later may succeed.
    ///
    /// True for network and remote failures; false for bad input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PeerUnreachable | Self::GitError | Self::SyncError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in cmdtrack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Git sync is not configured in {}", dir.display())]
    NotInitialized { dir: PathBuf },

    #[error("Entry not found: {id}")]
    EntryNotFound { id: String },

    #[error("Subscription not found: {id}")]
    SubscriptionNotFound { id: String },

    #[error("This repository is already added: {url}")]
    AlreadySubscribed { url: String },

    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("Sync cancelled: repository is in a conflicted state")]
    Conflicted,

    #[error("Sync conflict could not be auto-resolved")]
    ManualInterventionRequired,

    #[error("Git execution failed (`git {command}`): {stderr}")]
    Git { command: String, stderr: String },

    #[error("Pull failed: {0}")]
    PullFailed(String),

    #[error("Failed to reconcile histories: {0}")]
    ReconcileFailed(String),

    #[error("Peer document request failed for {url}: status code {status}")]
    PeerStatus { url: String, status: u16 },

    #[error("Peer document at {url} is malformed: {message}")]
    PeerPayload { url: String, message: String },

    #[error("Could not reach {url}: {message}")]
    PeerNetwork { url: String, message: String },

    #[error("Timed out after {secs}s fetching {url}")]
    PeerTimeout { url: String, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::EntryNotFound { .. } => ErrorCode::EntryNotFound,
            Self::SubscriptionNotFound { .. } => ErrorCode::SubscriptionNotFound,
            Self::AlreadySubscribed { .. } => ErrorCode::AlreadySubscribed,
            Self::InvalidUrl(_) => ErrorCode::InvalidUrl,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Conflicted => ErrorCode::Conflicted,
            Self::ManualInterventionRequired => ErrorCode::ManualIntervention,
            Self::Git { .. } => ErrorCode::GitError,
            Self::PullFailed(_) | Self::ReconcileFailed(_) => ErrorCode::SyncError,
            Self::PeerStatus { .. }
            | Self::PeerPayload { .. }
            | Self::PeerNetwork { .. }
            | Self::PeerTimeout { .. } => ErrorCode::PeerUnreachable,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this is a peer fetch failure (marks a subscription unreachable).
    #[must_use]
    pub const fn is_peer_failure(&self) -> bool {
        matches!(self.error_code(), ErrorCode::PeerUnreachable)
    }

    /// The diagnostic text git printed, if this error came from git.
    #[must_use]
    pub fn git_stderr(&self) -> Option<&str> {
        match self {
            Self::Git { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { .. } => {
                Some("Run `ct init --remote <url>` or `ct sync` to set up git sync".to_string())
            }
            Self::EntryNotFound { .. } => {
                Some("Use `ct show` to list entries and their ids".to_string())
            }
            Self::SubscriptionNotFound { .. } => {
                Some("Use `ct peers` to list subscriptions and their ids".to_string())
            }
            Self::InvalidUrl(_) => Some(
                "Expected a GitHub repository URL such as https://github.com/user/repo".to_string(),
            ),
            Self::Conflicted => Some(
                "Run `ct sync` again and accept the reset, or resolve the repository by hand"
                    .to_string(),
            ),
            Self::ManualInterventionRequired => Some(
                "Resolve the conflict in the storage directory manually, or run `ct reset` \
                 to reconfigure git sync"
                    .to_string(),
            ),
            Self::PullFailed(_) => {
                Some("Check your connection or resolve conflicts manually".to_string())
            }
            Self::Git { stderr, .. } if stderr.contains("Authentication failed") => {
                Some("Check your git credentials for the configured remote".to_string())
            }
            Self::Git { stderr, .. } if stderr.contains("No such remote") => {
                Some("Run `ct reset --remote <url>` to configure the remote".to_string())
            }
            Self::PeerStatus { status: 404, .. } => Some(
                "The peer repository must be public and publish data.json on its default branch"
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
