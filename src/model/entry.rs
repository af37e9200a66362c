//! Entry model.
//!
//! An entry is a single user-visible command or prompt. Entries are either
//! authored locally (`source` absent or `"local"`) or mirrored from a peer's
//! published document (`source` = peer username, `original_id` = the id the
//! entry holds in the peer's own document).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Source label used for locally authored entries.
pub const LOCAL_SOURCE: &str = "local";

/// Suffix appended to a peer's username when a subscription is archived.
pub const ARCHIVED_SUFFIX: &str = " (Archived)";

/// Color used when an entry carries none.
pub const DEFAULT_COLOR: &str = "var(--text-color)";

/// Category of an entry; decides which view lists it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntryKind {
    #[default]
    Commands,
    Prompts,
    /// A category written by a newer client; preserved verbatim.
    Other(String),
}

impl EntryKind {
    /// Parse a user-supplied category, accepting singular forms.
    pub fn parse_known(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "commands" | "command" | "cmd" => Some(Self::Commands),
            "prompts" | "prompt" => Some(Self::Prompts),
            _ => None,
        }
    }

    /// Icon shown when the entry has none of its own.
    #[must_use]
    pub fn default_icon(&self) -> &'static str {
        match self {
            Self::Prompts => "terminal",
            Self::Commands | Self::Other(_) => "symbol-folder",
        }
    }
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "commands" => Self::Commands,
            "prompts" => Self::Prompts,
            _ => Self::Other(s),
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Commands => write!(f, "commands"),
            Self::Prompts => write!(f, "prompts"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Uniqueness key of an entry within a document.
///
/// `(source or "local", original_id or id)`, with the source lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub source: String,
    pub id: String,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.id)
    }
}

/// A command or prompt record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Locally unique id. Local ids encode the creation time in milliseconds.
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: EntryKind,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default)]
    pub pinned: bool,

    /// Peer username for mirrored entries; absent for local ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Id of the entry in the peer's document.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "de_opt_id")]
    pub original_id: Option<String>,

    /// Creation time (Unix milliseconds). Older documents lack it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,

    /// Fields this version does not know about, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entry {
    /// Create a locally authored entry stamped with the current time.
    pub fn new_local(kind: EntryKind, name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: now.to_string(),
            kind,
            name: name.into(),
            content: content.into(),
            notes: None,
            icon: None,
            color: None,
            pinned: false,
            source: None,
            original_id: None,
            created_at: Some(now),
            extra: Map::new(),
        }
    }

    /// Build the local mirror of a peer's entry.
    ///
    /// The mirror gets a fresh local id; the peer's id becomes `original_id`.
    #[must_use]
    pub fn mirror_of(peer: &Entry, username: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: timestamped_id(now),
            source: Some(username.to_string()),
            original_id: Some(peer.id.clone()),
            pinned: false,
            created_at: Some(now),
            ..peer.clone()
        }
    }

    /// Refresh this mirror from a newer copy of the peer's entry.
    ///
    /// Keeps the local id, pin state, and creation time.
    pub fn refresh_from(&mut self, peer: &Entry, username: &str) {
        let refreshed = Self {
            id: std::mem::take(&mut self.id),
            source: Some(username.to_string()),
            original_id: Some(peer.id.clone()),
            pinned: self.pinned,
            created_at: self.created_at,
            ..peer.clone()
        };
        *self = refreshed;
    }

    /// Whether this entry was authored locally.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.source
            .as_deref()
            .is_none_or(|s| s.eq_ignore_ascii_case(LOCAL_SOURCE))
    }

    /// Whether this entry mirrors the given peer (case-insensitive).
    #[must_use]
    pub fn is_from(&self, username: &str) -> bool {
        self.source
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case(username))
    }

    /// The identity key used by merge and dedup.
    #[must_use]
    pub fn identity_key(&self) -> IdentityKey {
        let source = match self.source.as_deref() {
            Some(s) if !s.is_empty() => s.to_lowercase(),
            _ => LOCAL_SOURCE.to_string(),
        };
        let id = self
            .original_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
            .to_string();
        IdentityKey { source, id }
    }

    /// Recency score for tie-breaking between two revisions.
    ///
    /// Uses `created_at` when present, otherwise the leading digits of the id.
    /// Ids without a numeric prefix score 0.
    #[must_use]
    pub fn recency(&self) -> u64 {
        match self.created_at {
            Some(ms) => u64::try_from(ms).unwrap_or(0),
            None => id_timestamp(&self.id),
        }
    }

    /// Icon to display, falling back to the category default.
    #[must_use]
    pub fn effective_icon(&self) -> &str {
        self.icon
            .as_deref()
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| self.kind.default_icon())
    }

    /// Color to display, falling back to the theme text color.
    #[must_use]
    pub fn effective_color(&self) -> &str {
        self.color
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_COLOR)
    }
}

/// Numeric prefix of an id, or 0 when it has none.
#[must_use]
pub fn id_timestamp(id: &str) -> u64 {
    let digits: &str = id
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(id, |(idx, _)| &id[..idx]);

    if digits.is_empty() {
        return 0;
    }
    digits.parse::<u64>().unwrap_or(u64::MAX)
}

/// Fresh id: millisecond timestamp plus 9 random base36 chars.
///
/// The numeric prefix keeps [`id_timestamp`] meaningful.
#[must_use]
pub fn timestamped_id(now_ms: i64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bits = uuid::Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(char::from(ALPHABET[(bits % 36) as usize]));
        bits /= 36;
    }
    format!("{now_ms}{suffix}")
}

/// Accept ids written as strings or numbers.
fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_id(deserializer).map(Option::unwrap_or_default)
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
