//! Command implementations.

pub mod completions;
pub mod document;
pub mod subscription;
pub mod sync;
pub mod version;

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{Settings, resolve_storage_dir};
use crate::error::{Error, Result};
use crate::peer::{HttpPeerFetcher, SubscriptionManager};
use crate::prompt::TerminalPrompt;
use crate::store::DocumentStore;
use crate::sync::{AutoSyncOutcome, GitCli, SyncDriver};

/// Resolved storage directory with its settings.
pub struct Workspace {
    pub settings: Settings,
    pub store: DocumentStore,
    assume_yes: bool,
}

impl Workspace {
    /// Resolve the storage directory and load its settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no storage directory can be determined.
    pub fn open(dir: Option<&Path>, assume_yes: bool) -> Result<Self> {
        let dir = resolve_storage_dir(dir)?;
        let settings = Settings::load(&dir);
        let store = DocumentStore::from_settings(&dir, &settings);
        debug!(dir = %dir.display(), "Opened workspace");
        Ok(Self {
            settings,
            store,
            assume_yes,
        })
    }

    #[must_use]
    pub fn prompt(&self) -> TerminalPrompt {
        TerminalPrompt::new(self.assume_yes)
    }

    #[must_use]
    pub fn driver(&self) -> SyncDriver<GitCli, TerminalPrompt> {
        SyncDriver::new(
            GitCli::new(self.store.dir()),
            self.prompt(),
            self.store.clone(),
            &self.settings,
        )
    }

    #[must_use]
    pub fn subscriptions(&self) -> SubscriptionManager<HttpPeerFetcher> {
        SubscriptionManager::new(
            self.store.clone(),
            HttpPeerFetcher::new(self.settings.fetch_timeout),
            &self.settings,
        )
    }

    /// Background sync after a mutation. Failures are logged, never returned.
    pub async fn after_save(&self) {
        if !self.settings.auto_sync {
            return;
        }
        match self.driver().auto_sync().await {
            Ok(AutoSyncOutcome::Deferred { detail }) => {
                warn!(%detail, "Auto-sync deferred; run `ct sync` to retry");
            }
            Ok(outcome) => debug!(?outcome, "Auto-sync finished"),
            Err(e) => warn!(error = %e, "Auto-sync failed"),
        }
    }
}

/// Create the tokio runtime commands block on.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
