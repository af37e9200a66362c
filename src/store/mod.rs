//! Document store.
//!
//! Reads and writes the canonical document file inside the storage
//! directory:
//!
//! - **Load**: never fails the caller; a missing or malformed file reads as
//!   an empty document. The legacy array encoding is upgraded on read.
//! - **Save**: deduplicates, then replaces the whole file atomically as
//!   pretty-printed JSON so git diffs stay readable.
//! - **Update**: a locked read-modify-write for mutations.
//!
//! # Example
//!
//! ```ignore
//! let store = DocumentStore::new(dir, "data.json");
//! let pinned = store.update(|doc| {
//!     doc.entry_mut(id).map(|e| e.pinned = true);
//!     Ok(doc.pinned_count())
//! }).await?;
//! ```

mod dedup;
mod file;
mod lock;

pub use dedup::{dedup_entries, dedup_subscriptions};
pub use file::atomic_write;
pub use lock::{DirGuard, lock_dir};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::model::Document;

/// Handle on the document file of one storage directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
    file_name: String,
}

impl DocumentStore {
    /// Create a store for `dir/file_name`.
    pub fn new(dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
        }
    }

    /// Create a store using the configured document file name.
    pub fn from_settings(dir: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self::new(dir, settings.document_file.clone())
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document file name relative to the storage directory.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Absolute path of the document file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Whether the document file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Load the document, treating any failure as an empty document.
    #[must_use]
    pub fn load(&self) -> Document {
        self.try_load().unwrap_or_else(|e| {
            warn!(path = %self.path().display(), error = %e, "Failed to read document");
            Document::default()
        })
    }

    /// Load the document; a missing file is an empty document.
    ///
    /// Mutations go through this so a malformed file is never overwritten
    /// with an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn try_load(&self) -> Result<Document> {
        let path = self.path();
        if !path.exists() {
            return Ok(Document::default());
        }
        let text = fs::read_to_string(&path)?;
        Document::parse(&text)
    }

    /// Deduplicate and persist the document.
    ///
    /// Returns `false` when the file already held exactly this content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, mut doc: Document) -> Result<bool> {
        doc.items = dedup_entries(doc.items);
        doc.subscriptions = dedup_subscriptions(doc.subscriptions);
        let content = doc.to_pretty_json()?;

        let path = self.path();
        if fs::read_to_string(&path).is_ok_and(|existing| existing == content) {
            debug!(path = %path.display(), "Document unchanged");
            return Ok(false);
        }

        atomic_write(&path, &content)?;
        debug!(path = %path.display(), items = doc.items.len(), "Document saved");
        Ok(true)
    }

    /// Seed an empty document if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.exists() {
            self.save(Document::default())?;
        }
        Ok(())
    }

    /// Locked read-modify-write.
    ///
    /// Holds the storage directory guard across load, `f`, and save. The
    /// document is saved only when `f` succeeds.
    ///
    /// # Errors
    ///
    /// Returns the error from loading, from `f`, or from saving.
    pub async fn update<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let _guard = lock_dir(&self.dir).await;
        let mut doc = self.try_load()?;
        let value = f(&mut doc)?;
        self.save(doc)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Entry, EntryKind};
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> DocumentStore {
        DocumentStore::new(temp_dir.path(), "data.json")
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::new(temp_dir.path().join("absent"), "data.json");
        assert_eq!(store.load(), Document::default());
    }

    #[test]
    fn test_load_upgrades_legacy_array() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.path(), r#"[{"id":"1","name":"ls","content":"ls -la"}]"#).unwrap();

        let doc = store.load();
        assert_eq!(doc.items.len(), 1);
        assert!(doc.subscriptions.is_empty());
    }

    #[test]
    fn test_load_malformed_is_empty_but_try_load_errors() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.path(), "<<<<<<< HEAD").unwrap();

        assert_eq!(store.load(), Document::default());
        assert!(matches!(store.try_load(), Err(Error::Json(_))));
    }

    #[test]
    fn test_save_creates_directory_and_dedups() {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::new(temp_dir.path().join("new-dir"), "data.json");
        let entry = Entry::new_local(EntryKind::Commands, "ls", "ls -la");
        let doc = Document {
            items: vec![entry.clone(), entry],
            subscriptions: Vec::new(),
        };

        assert!(store.save(doc).unwrap());
        let reloaded = store.load();
        assert_eq!(reloaded.items.len(), 1);

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\n  \"items\""));
    }

    #[test]
    fn test_save_reports_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let doc = Document {
            items: vec![Entry::new_local(EntryKind::Prompts, "p", "q")],
            subscriptions: Vec::new(),
        };
        assert!(store.save(doc.clone()).unwrap());
        assert!(!store.save(doc).unwrap());
    }

    #[test]
    fn test_ensure_exists_seeds_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.ensure_exists().unwrap();
        assert!(store.exists());
        assert_eq!(store.try_load().unwrap(), Document::default());
    }

    #[tokio::test]
    async fn test_update_persists_only_on_success() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let count = store
            .update(|doc| {
                doc.items.push(Entry::new_local(EntryKind::Commands, "a", "b"));
                Ok(doc.items.len())
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let result: Result<()> = store
            .update(|doc| {
                doc.items.clear();
                Err(Error::Other("nope".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(store.load().items.len(), 1);
    }

    #[tokio::test]
    async fn test_update_refuses_to_clobber_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        fs::write(store.path(), "{ broken").unwrap();

        let result = store.update(|_| Ok(())).await;
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{ broken");
    }
}
