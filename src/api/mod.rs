//! Remote Web API surface consumed by the exporter.
//!
//! The pipeline only talks to the traits below; `SlackClient` is the HTTP
//! implementation and tests substitute scripted fakes.

pub mod client;
pub mod types;

pub use client::SlackClient;
pub use types::{
    AuthIdentity, Conversation, ConversationsPage, HistoryPage, MembersPage, User, UsersPage,
};

use crate::error::ApiError;

/// Lower bound passed as `oldest` on every history/replies request
pub const OLDEST_TIMESTAMP: &str = "0";

/// Paginated message endpoints
pub trait ConversationApi {
    /// `conversations.history`: up to `limit` messages older than `latest`
    /// (newest page when `latest` is None), newest first
    fn history(&self, channel: &str, latest: Option<&str>, limit: u32)
        -> Result<HistoryPage, ApiError>;

    /// `conversations.replies`: the thread rooted at `ts`, root included
    fn replies(
        &self,
        channel: &str,
        ts: &str,
        latest: Option<&str>,
        limit: u32,
    ) -> Result<HistoryPage, ApiError>;
}

/// Workspace listing endpoints used to pick conversations and write metadata
pub trait WorkspaceApi {
    fn auth_test(&self) -> Result<AuthIdentity, ApiError>;

    fn list_users(&self, cursor: Option<&str>) -> Result<UsersPage, ApiError>;

    /// `types` is a comma separated list such as `private_channel,mpim`
    fn list_conversations(&self, types: &str, cursor: Option<&str>)
        -> Result<ConversationsPage, ApiError>;

    fn conversation_members(&self, channel: &str, cursor: Option<&str>)
        -> Result<MembersPage, ApiError>;
}
