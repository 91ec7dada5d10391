//! Workspace bootstrap and conversation selection.
//!
//! Loads the users and conversations the token can see, and decides which
//! conversations an export run covers.

pub mod metadata;
pub mod selection;

pub use selection::{Selection, SelectionFilter};

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{AuthIdentity, Conversation, User, WorkspaceApi};
use crate::error::ExportError;
use crate::export::{RateLimitedCaller, Sleeper};

/// Conversation types requested from `conversations.list`
const PUBLIC_TYPES: &str = "public_channel";
const GROUP_TYPES: &str = "private_channel,mpim";
const DM_TYPES: &str = "im";

/// Everything known about the workspace before exporting
#[derive(Debug, Clone)]
pub struct Workspace {
    pub identity: AuthIdentity,
    pub users: Vec<User>,
    /// Public channels, with members
    pub channels: Vec<Conversation>,
    /// Private channels and group DMs, with members
    pub groups: Vec<Conversation>,
    /// 1:1 DMs
    pub dms: Vec<Conversation>,
    user_names_by_id: HashMap<String, String>,
    user_ids_by_name: HashMap<String, String>,
}

impl Workspace {
    pub fn new(
        identity: AuthIdentity,
        users: Vec<User>,
        channels: Vec<Conversation>,
        groups: Vec<Conversation>,
        dms: Vec<Conversation>,
    ) -> Self {
        let user_names_by_id = users
            .iter()
            .map(|u| (u.id.clone(), u.name.clone()))
            .collect();
        let user_ids_by_name = users
            .iter()
            .map(|u| (u.name.clone(), u.id.clone()))
            .collect();

        Self {
            identity,
            users,
            channels,
            groups,
            dms,
            user_names_by_id,
            user_ids_by_name,
        }
    }

    /// Verify the token, then list users and every conversation type.
    /// `delay` is slept between listing calls.
    pub fn bootstrap<A, S>(
        api: &A,
        caller: &RateLimitedCaller<S>,
        delay: Duration,
    ) -> Result<Self, ExportError>
    where
        A: WorkspaceApi + ?Sized,
        S: Sleeper,
    {
        let identity = caller.call("auth.test", || api.auth_test())?;
        info!(team = %identity.team, user = %identity.user, "Successfully authenticated");

        let users = list_users(api, caller)?;
        info!("Found {} Users", users.len());
        caller.pause(delay);

        let mut channels = list_conversations(api, caller, PUBLIC_TYPES)?;
        info!("Found {} Public Channels", channels.len());
        load_members(api, caller, &mut channels)?;
        caller.pause(delay);

        let mut groups = list_conversations(api, caller, GROUP_TYPES)?;
        info!("Found {} Private Channels or Group DMs", groups.len());
        load_members(api, caller, &mut groups)?;
        caller.pause(delay);

        let dms = list_conversations(api, caller, DM_TYPES)?;
        info!("Found {} 1:1 DM conversations", dms.len());
        caller.pause(delay);

        Ok(Self::new(identity, users, channels, groups, dms))
    }

    pub fn user_name(&self, user_id: &str) -> Option<&str> {
        self.user_names_by_id.get(user_id).map(String::as_str)
    }

    /// Resolve a user name to an id; unknown names are assumed to be ids
    pub fn resolve_user<'s>(&'s self, name_or_id: &'s str) -> &'s str {
        self.user_ids_by_name
            .get(name_or_id)
            .map(String::as_str)
            .unwrap_or(name_or_id)
    }

    /// Human-readable label for a DM: the other party's name
    pub fn dm_label(&self, dm: &Conversation) -> String {
        let user = dm.user.as_deref().unwrap_or(&dm.id);
        match self.user_name(user) {
            Some(name) => name.to_string(),
            None => format!("{user} (name unknown)"),
        }
    }
}

fn list_users<A, S>(api: &A, caller: &RateLimitedCaller<S>) -> Result<Vec<User>, ExportError>
where
    A: WorkspaceApi + ?Sized,
    S: Sleeper,
{
    let mut users = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = caller.call("users.list", || api.list_users(cursor.as_deref()))?;
        let next = page.next_cursor().map(str::to_string);
        users.extend(page.members);
        match next {
            Some(next) => cursor = Some(next),
            None => return Ok(users),
        }
    }
}

fn list_conversations<A, S>(
    api: &A,
    caller: &RateLimitedCaller<S>,
    types: &str,
) -> Result<Vec<Conversation>, ExportError>
where
    A: WorkspaceApi + ?Sized,
    S: Sleeper,
{
    let label = format!("conversations.list {types}");
    let mut conversations = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = caller.call(&label, || api.list_conversations(types, cursor.as_deref()))?;
        let next = page.next_cursor().map(str::to_string);
        conversations.extend(page.channels);
        match next {
            Some(next) => cursor = Some(next),
            None => return Ok(conversations),
        }
    }
}

/// Fill in `members` for each conversation; export viewers need the lists
fn load_members<A, S>(
    api: &A,
    caller: &RateLimitedCaller<S>,
    conversations: &mut [Conversation],
) -> Result<(), ExportError>
where
    A: WorkspaceApi + ?Sized,
    S: Sleeper,
{
    for conversation in conversations.iter_mut() {
        let label = format!("conversations.members {}", conversation.id);
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = caller.call(&label, || {
                api.conversation_members(&conversation.id, cursor.as_deref())
            })?;
            let next = page.next_cursor().map(str::to_string);
            members.extend(page.members);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        debug!(conversation = conversation.display_name(), members = members.len(), "Retrieved members");
        conversation.members = Some(members);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use serde_json::{json, Map};

    use super::*;
    use crate::api::{ConversationsPage, MembersPage, UsersPage};
    use crate::error::ApiError;

    pub fn user(id: &str, name: &str) -> User {
        User {
            id: id.to_string(),
            name: name.to_string(),
            extra: Map::new(),
        }
    }

    pub fn conversation(id: &str, name: Option<&str>) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: name.map(str::to_string),
            user: None,
            is_archived: false,
            is_member: true,
            is_mpim: false,
            members: None,
            extra: Map::new(),
        }
    }

    pub fn dm(id: &str, user: &str) -> Conversation {
        Conversation {
            user: Some(user.to_string()),
            ..conversation(id, None)
        }
    }

    pub fn identity() -> AuthIdentity {
        AuthIdentity {
            team: "Acme".to_string(),
            user: "owner".to_string(),
            user_id: "U0".to_string(),
        }
    }

    /// Serves a fixed workspace; users and public channels come in two pages
    #[derive(Default)]
    pub struct FakeWorkspace {
        pub calls: RefCell<Vec<String>>,
    }

    impl WorkspaceApi for FakeWorkspace {
        fn auth_test(&self) -> Result<AuthIdentity, ApiError> {
            self.calls.borrow_mut().push("auth.test".to_string());
            Ok(identity())
        }

        fn list_users(&self, cursor: Option<&str>) -> Result<UsersPage, ApiError> {
            self.calls.borrow_mut().push(format!("users.list {cursor:?}"));
            let page = match cursor {
                None => json!({"members": [{"id": "U1", "name": "alice"}], "response_metadata": {"next_cursor": "u2"}}),
                Some(_) => json!({"members": [{"id": "U2", "name": "bob", "real_name": "Bob"}], "response_metadata": {"next_cursor": ""}}),
            };
            Ok(serde_json::from_value(page).unwrap())
        }

        fn list_conversations(&self, types: &str, cursor: Option<&str>) -> Result<ConversationsPage, ApiError> {
            self.calls.borrow_mut().push(format!("conversations.list {types} {cursor:?}"));
            let page = match (types, cursor) {
                (PUBLIC_TYPES, None) => json!({"channels": [{"id": "C1", "name": "general", "is_member": true}], "response_metadata": {"next_cursor": "c2"}}),
                (PUBLIC_TYPES, Some(_)) => json!({"channels": [{"id": "C2", "name": "random", "is_archived": true}]}),
                (GROUP_TYPES, _) => json!({"channels": [{"id": "G1", "name": "secret"}, {"id": "G2", "name": "mpdm-alice--bob-1", "is_mpim": true}]}),
                _ => json!({"channels": [{"id": "D1", "user": "U1"}]}),
            };
            Ok(serde_json::from_value(page).unwrap())
        }

        fn conversation_members(&self, channel: &str, _cursor: Option<&str>) -> Result<MembersPage, ApiError> {
            self.calls.borrow_mut().push(format!("conversations.members {channel}"));
            Ok(serde_json::from_value(json!({"members": ["U0", "U1"]})).unwrap())
        }
    }
}
