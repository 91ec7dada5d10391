//! slack-export library crate.
//!
//! This library provides the core functionality for slack-export, including:
//! - Rate-limited access to the Slack Web API
//! - Paginated history walks with thread expansion
//! - Per-day archiving of conversation history
//! - Workspace bootstrap and conversation selection

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod export;
pub mod exporter;
pub mod message;
pub mod workspace;
