//! Subscription model.
//!
//! A subscription points at a peer's public repository whose `data.json`
//! is mirrored into the local document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::timestamped_id;

/// Reachability of a peer at the last refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Unreachable,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A pointer to a peer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,

    /// Peer identity (lowercased repository owner).
    pub username: String,

    /// Canonical repository URL as entered by the user, trailing slash removed.
    pub url: String,

    #[serde(default)]
    pub status: SubscriptionStatus,

    /// ISO-8601 time of the last successful fetch.
    #[serde(default)]
    pub last_synced: String,
}

impl Subscription {
    /// Create an active subscription synced now.
    pub fn new(username: impl Into<String>, url: impl Into<String>) -> Self {
        Self::created_at(username, url, Utc::now())
    }

    /// Create an active subscription synced at `now`.
    ///
    /// Ids stay unique when several are created within one millisecond.
    pub fn created_at(username: impl Into<String>, url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: timestamped_id(now.timestamp_millis()),
            username: username.into(),
            url: url.into(),
            status: SubscriptionStatus::Active,
            last_synced: now.to_rfc3339(),
        }
    }

    /// Key subscriptions are unique by.
    #[must_use]
    pub fn url_key(&self) -> String {
        self.url.to_lowercase()
    }

    /// Mark a successful fetch.
    pub fn mark_synced(&mut self) {
        self.status = SubscriptionStatus::Active;
        self.last_synced = Utc::now().to_rfc3339();
    }

    /// Whether `self` was synced after `other`.
    ///
    /// Compares as timestamps when both parse, as strings otherwise.
    #[must_use]
    pub fn synced_after(&self, other: &Self) -> bool {
        let parse = |s: &str| DateTime::parse_from_rfc3339(s).ok();
        match (parse(&self.last_synced), parse(&other.last_synced)) {
            (Some(a), Some(b)) => a > b,
            _ => self.last_synced > other.last_synced,
        }
    }
}
