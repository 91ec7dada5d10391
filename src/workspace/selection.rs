//! Which conversations an export run covers.

use super::Workspace;
use crate::api::Conversation;

/// Per-kind conversation filters, as given on the command line.
///
/// For each kind: `None` means the flag was not given, `Some(vec![])` means
/// the flag was given without values, `Some(names)` restricts to those names.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub public_channels: Option<Vec<String>>,
    pub groups: Option<Vec<String>>,
    /// User names or ids
    pub direct_messages: Option<Vec<String>>,
    pub exclude_archived: bool,
    /// Only public channels the token owner belongs to
    pub exclude_non_member: bool,
}

/// Resolved filter for one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionFilter<'a> {
    All,
    Named(&'a [String]),
    Nothing,
}

impl Selection {
    fn any_specified(&self) -> bool {
        self.public_channels.is_some() || self.groups.is_some() || self.direct_messages.is_some()
    }

    /// Non-empty list filters by name; a bare flag, or no kind flags at all,
    /// selects everything; otherwise the kind is skipped.
    pub fn filter_for<'a>(&self, arg: &'a Option<Vec<String>>) -> SelectionFilter<'a> {
        match arg {
            Some(names) if !names.is_empty() => SelectionFilter::Named(names),
            Some(_) => SelectionFilter::All,
            None if !self.any_specified() => SelectionFilter::All,
            None => SelectionFilter::Nothing,
        }
    }

    pub fn select_channels(&self, workspace: &Workspace) -> Vec<Conversation> {
        let mut selected = self.select_named(&workspace.channels, &self.public_channels);
        if self.exclude_non_member {
            selected.retain(|c| c.is_member);
        }
        selected
    }

    pub fn select_groups(&self, workspace: &Workspace) -> Vec<Conversation> {
        self.select_named(&workspace.groups, &self.groups)
    }

    pub fn select_dms(&self, workspace: &Workspace) -> Vec<Conversation> {
        let candidates = self.unarchived(&workspace.dms);
        match self.filter_for(&self.direct_messages) {
            SelectionFilter::All => candidates.into_iter().cloned().collect(),
            SelectionFilter::Named(names) => {
                let ids: Vec<&str> = names.iter().map(|n| workspace.resolve_user(n)).collect();
                candidates
                    .into_iter()
                    .filter(|dm| dm.user.as_deref().is_some_and(|u| ids.contains(&u)))
                    .cloned()
                    .collect()
            }
            SelectionFilter::Nothing => Vec::new(),
        }
    }

    fn select_named(&self, all: &[Conversation], arg: &Option<Vec<String>>) -> Vec<Conversation> {
        let candidates = self.unarchived(all);
        match self.filter_for(arg) {
            SelectionFilter::All => candidates.into_iter().cloned().collect(),
            SelectionFilter::Named(names) => candidates
                .into_iter()
                .filter(|c| c.name.as_ref().is_some_and(|n| names.contains(n)))
                .cloned()
                .collect(),
            SelectionFilter::Nothing => Vec::new(),
        }
    }

    fn unarchived<'c>(&self, all: &'c [Conversation]) -> Vec<&'c Conversation> {
        all.iter()
            .filter(|c| !(self.exclude_archived && c.is_archived))
            .collect()
    }
}
