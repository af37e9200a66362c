//! Document model and on-disk schema.
//!
//! The document is the unit of persistence and of merging. Two encodings
//! exist on disk:
//!
//! - **Legacy**: a bare JSON array of entries
//! - **Current**: `{ "items": [...], "subscriptions": [...] }`
//!
//! Both are read through [`DocumentFile`] and upgraded once into the
//! canonical [`Document`]; only the current encoding is ever written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

use super::entry::Entry;
use super::subscription::Subscription;

/// The canonical in-memory document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub items: Vec<Entry>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// Every shape a persisted or published document may take.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentFile {
    Legacy(Vec<Entry>),
    Current(Document),
}

impl From<DocumentFile> for Document {
    fn from(file: DocumentFile) -> Self {
        match file {
            DocumentFile::Legacy(items) => Self {
                items,
                subscriptions: Vec::new(),
            },
            DocumentFile::Current(doc) => doc,
        }
    }
}

impl Document {
    /// Parse either encoding, upgrading the legacy array form.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a document in either encoding.
    pub fn parse(text: &str) -> Result<Self> {
        let file: DocumentFile = serde_json::from_str(text)?;
        Ok(file.into())
    }

    /// Parse a peer's published document, keeping every usable entry.
    ///
    /// Entries that do not deserialize are logged and skipped. The peer's
    /// own subscriptions are not read.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON, or is neither an array nor
    /// an object whose `items` is an array.
    pub fn parse_feed(text: &str) -> Result<Self> {
        let raw_items = match serde_json::from_str::<Value>(text)? {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => items,
                None | Some(Value::Null) => Vec::new(),
                Some(_) => return Err(Error::Other("`items` is not an array".to_string())),
            },
            _ => return Err(Error::Other("expected a JSON array or object".to_string())),
        };

        let items = raw_items
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value::<Entry>(raw) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed peer entry");
                    None
                }
            })
            .collect();

        Ok(Self {
            items,
            subscriptions: Vec::new(),
        })
    }

    /// Pretty-printed JSON (two-space indent), the persisted form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Find an entry by its local id, mutably.
    pub fn entry_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.items.iter_mut().find(|e| e.id == id)
    }

    /// Whether a subscription with this url exists (case-insensitive).
    #[must_use]
    pub fn is_subscribed(&self, url: &str) -> bool {
        let key = url.to_lowercase();
        self.subscriptions.iter().any(|s| s.url_key() == key)
    }

    /// Number of pinned entries.
    #[must_use]
    pub fn pinned_count(&self) -> usize {
        self.items.iter().filter(|e| e.pinned).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_array() {
        let doc = Document::parse(r#"[{"id":"1","name":"ls","content":"ls -la"}]"#).unwrap();
        assert_eq!(doc.items.len(), 1);
        assert!(doc.subscriptions.is_empty());
    }

    #[test]
    fn test_parse_object_with_missing_sections() {
        let doc = Document::parse("{}").unwrap();
        assert_eq!(doc, Document::default());

        let doc = Document::parse(r#"{"items":[{"id":"1","name":"a","content":"b"}]}"#).unwrap();
        assert_eq!(doc.items.len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Document::parse("not json").is_err());
        assert!(Document::parse("42").is_err());
    }

    #[test]
    fn test_parse_feed_skips_malformed_entries() {
        let text = r#"{"items":[
            {"id":"1","name":"ls","content":"ls -la"},
            {"id":{"nested":true},"name":"bad","content":"x"},
            {"id":"3","name":["not","a","string"]},
            "just a string",
            {"id":"4","type":"prompts","name":"review","content":"Review"}
        ],"subscriptions":"ignored"}"#;

        let doc = Document::parse_feed(text).unwrap();
        let names: Vec<&str> = doc.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ls", "review"]);
        assert!(doc.subscriptions.is_empty());
        assert!(Document::parse(text).is_err());
    }

    #[test]
    fn test_parse_feed_accepts_both_encodings() {
        let legacy = Document::parse_feed(r#"[{"id":"1","name":"a","content":"b"}, 7]"#).unwrap();
        assert_eq!(legacy.items.len(), 1);
        assert_eq!(Document::parse_feed("{}").unwrap(), Document::default());
    }

    #[test]
    fn test_parse_feed_rejects_other_shapes() {
        assert!(Document::parse_feed("not json").is_err());
        assert!(Document::parse_feed("42").is_err());
        assert!(Document::parse_feed(r#"{"items":{"id":"1"}}"#).is_err());
    }

    #[test]
    fn test_pretty_json_is_object_form() {
        let doc = Document::parse(r#"[{"id":"1","name":"ls","content":"ls"}]"#).unwrap();
        let text = doc.to_pretty_json().unwrap();
        assert!(text.starts_with("{\n  \"items\": ["));
        assert!(text.contains("\"subscriptions\": []"));
    }

    #[test]
    fn test_is_subscribed_ignores_case() {
        let mut doc = Document::default();
        doc.subscriptions
            .push(Subscription::new("alice", "https://github.com/Alice/cmds"));
        assert!(doc.is_subscribed("https://GITHUB.com/alice/CMDS"));
        assert!(!doc.is_subscribed("https://github.com/bob/cmds"));
    }
}
