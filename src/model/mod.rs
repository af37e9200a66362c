//! Data models for cmdtrack.
//!
//! This module contains the document shape shared by the store, the merge
//! engine, and peers:
//! - Entry (command or prompt)
//! - Subscription (peer pointer)
//! - Document (unit of persistence and merging)

pub mod document;
pub mod entry;
pub mod subscription;

pub use document::{Document, DocumentFile};
pub use entry::{Entry, EntryKind, IdentityKey};
pub use subscription::{Subscription, SubscriptionStatus};
