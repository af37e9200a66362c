//! Configuration management.
//!
//! This module resolves the storage directory and loads per-installation
//! settings.
//!
//! # Layout
//!
//! Everything lives in one storage directory (default `~/.cmdtrack/`):
//! - `data.json` - the document, tracked by git when sync is configured
//! - `config.json` - optional settings, never staged
//! - `.git/` - created by `ct init` / `ct sync`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings file name inside the storage directory.
pub const CONFIG_FILE: &str = "config.json";

const DEFAULT_BRANCH: &str = "main";
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_DOCUMENT_FILE: &str = "data.json";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";

/// Get the default storage directory location (`~/.cmdtrack/`).
#[must_use]
pub fn default_storage_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".cmdtrack"))
}

/// Resolve the storage directory.
///
/// Priority:
/// 1. If `explicit_path` is provided (`--dir` or `CT_DIR`), use it directly
/// 2. `~/.cmdtrack/`
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn resolve_storage_dir(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }

    default_storage_dir()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
}

/// Raw settings as stored in `config.json`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    pub branch: Option<String>,
    pub remote: Option<String>,
    pub document_file: Option<String>,
    pub fetch_timeout_secs: Option<u64>,
    pub raw_host: Option<String>,
    pub auto_sync: Option<bool>,
}

/// Load `config.json` from the storage directory.
///
/// A missing file yields defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_settings_file(dir: &Path) -> Result<SettingsFile> {
    let path = dir.join(CONFIG_FILE);

    if !path.exists() {
        return Ok(SettingsFile::default());
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Branch used for pull/push and for peer raw URLs.
    pub branch: String,
    /// Name of the git remote.
    pub remote: String,
    /// Document file name inside the storage directory.
    pub document_file: String,
    /// Upper bound for one peer fetch.
    pub fetch_timeout: Duration,
    /// Host serving raw file contents of peer repositories.
    pub raw_host: String,
    /// Whether saves trigger a silent sync.
    pub auto_sync: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve(SettingsFile::default(), |_| None)
    }
}

impl Settings {
    /// Load settings for a storage directory.
    ///
    /// An unreadable `config.json` is logged and ignored.
    #[must_use]
    pub fn load(dir: &Path) -> Self {
        let file = load_settings_file(dir).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring config file");
            SettingsFile::default()
        });
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Resolve settings. Priority: env var > config file > default.
    pub fn resolve(file: SettingsFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_nonempty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        // Zero would time out every fetch; treat it like an unparsable value.
        let fetch_timeout_secs = env_nonempty("CT_FETCH_TIMEOUT")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .or(file.fetch_timeout_secs.filter(|&secs| secs > 0))
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);

        let raw_host = env_nonempty("CT_RAW_HOST")
            .or(file.raw_host)
            .unwrap_or_else(|| DEFAULT_RAW_HOST.to_string());

        let auto_sync = env_nonempty("CT_AUTO_SYNC")
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .or(file.auto_sync)
            .unwrap_or(true);

        Self {
            branch: file.branch.unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            remote: file.remote.unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            document_file: file
                .document_file
                .unwrap_or_else(|| DEFAULT_DOCUMENT_FILE.to_string()),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            raw_host: raw_host.trim_end_matches('/').to_string(),
            auto_sync,
        }
    }

    /// Remote-tracking ref for the sync branch (e.g. `origin/main`).
    #[must_use]
    pub fn tracking_ref(&self) -> String {
        format!("{}/{}", self.remote, self.branch)
    }
}
