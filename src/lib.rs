//! cmdtrack - a personal library of shell commands and AI prompts
//!
//! This crate provides the core functionality for the `ct` CLI tool. The
//! library lives in one JSON document inside a storage directory that is
//! optionally a git working copy, synced to a remote and merged
//! semantically when histories diverge. Other users' published documents
//! can be subscribed to and mirrored locally.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Entry, Subscription, Document)
//! - [`store`] - Locked, atomic document persistence
//! - [`sync`] - Git sync driver, conflict resolution, and the JSON merge
//! - [`peer`] - Peer subscriptions fetched over HTTP
//! - [`config`] - Storage directory and settings
//! - [`prompt`] - Interactive questions
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod peer;
pub mod prompt;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
