//! Export orchestration.
//!
//! Bootstraps the workspace, picks conversations, then for each one fetches
//! the full message stream and archives it. Conversations are processed one
//! at a time, public channels first, then groups, then DMs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::api::{Conversation, ConversationApi, WorkspaceApi};
use crate::archive::{ChronologicalArchiver, ConversationKind};
use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::export::{fetch_conversation, Pacing, PageWalker, RateLimitedCaller, Sleeper};
use crate::workspace::metadata::{write_metadata, write_placeholder_channel};
use crate::workspace::{Selection, Workspace};

/// Prefix tried when a channel name is not a valid directory name
const FALLBACK_DIR_PREFIX: &str = "c-";

/// Options for one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving the metadata files and one directory per conversation
    pub root: PathBuf,
    pub page_size: u32,
    /// List selected conversations without fetching or writing anything
    pub dry_run: bool,
    pub selection: Selection,
}

/// Outcome for one archived conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReport {
    pub id: String,
    pub kind: ConversationKind,
    /// Final directory name, after any renames
    pub directory: String,
    pub messages: usize,
    pub days_written: usize,
    pub renames: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub conversations: Vec<ConversationReport>,
}

impl ExportReport {
    pub fn total_messages(&self) -> usize {
        self.conversations.iter().map(|c| c.messages).sum()
    }
}

/// Conversations chosen for this run
#[derive(Debug, Clone, Default)]
pub struct ExportPlan {
    pub channels: Vec<Conversation>,
    pub groups: Vec<Conversation>,
    pub dms: Vec<Conversation>,
}

impl ExportPlan {
    pub fn from_selection(selection: &Selection, workspace: &Workspace) -> Self {
        Self {
            channels: selection.select_channels(workspace),
            groups: selection.select_groups(workspace),
            dms: selection.select_dms(workspace),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.groups.is_empty() && self.dms.is_empty()
    }
}

/// Run a complete export against `api`
pub fn run_export<A, S>(
    api: &A,
    caller: &RateLimitedCaller<S>,
    config: &ExportConfig,
    options: &ExportOptions,
) -> Result<ExportReport>
where
    A: ConversationApi + WorkspaceApi + ?Sized,
    S: Sleeper,
{
    let workspace = Workspace::bootstrap(api, caller, config.bootstrap_delay())
        .context("Failed to load workspace")?;
    let plan = ExportPlan::from_selection(&options.selection, &workspace);

    if options.dry_run {
        print_plan(&plan, &workspace);
        return Ok(ExportReport::default());
    }

    fs::create_dir_all(&options.root)
        .with_context(|| format!("Failed to create export directory: {}", options.root.display()))?;
    write_metadata(&options.root, &workspace).context("Failed to write workspace metadata")?;

    if plan.is_empty() {
        warn!("No conversations selected");
    }

    let walker = PageWalker::new(api, caller, Pacing::from_config(config));
    let archiver = ChronologicalArchiver::new(&options.root);
    let mut report = ExportReport::default();

    if !plan.channels.is_empty() {
        info!("Fetching {} public channels", plan.channels.len());
    }
    for channel in &plan.channels {
        info!("Fetching history for Public Channel: {}", channel.display_name());
        let dir = prepare_directory(&options.root, channel.display_name())?;
        report.conversations.push(export_conversation(
            &walker,
            &archiver,
            channel,
            &dir,
            ConversationKind::Channel,
            options.page_size,
        )?);
    }

    if !plan.groups.is_empty() {
        if plan.channels.is_empty() {
            write_placeholder_channel(&options.root, &workspace, Local::now().date_naive())
                .context("Failed to write placeholder channel")?;
        }
        info!("Fetching {} Private Channels and Group DMs", plan.groups.len());
    }
    for group in &plan.groups {
        info!("Fetching history for Private Channel / Group DM: {}", group.display_name());
        let dir = prepare_directory(&options.root, group.display_name())?;
        report.conversations.push(export_conversation(
            &walker,
            &archiver,
            group,
            &dir,
            ConversationKind::Group,
            options.page_size,
        )?);
    }

    if !plan.dms.is_empty() {
        info!("Fetching {} 1:1 DMs", plan.dms.len());
    }
    for dm in &plan.dms {
        info!("Fetching 1:1 DMs with {}", workspace.dm_label(dm));
        let dir = prepare_directory(&options.root, &dm.id)?;
        report.conversations.push(export_conversation(
            &walker,
            &archiver,
            dm,
            &dir,
            ConversationKind::Im,
            options.page_size,
        )?);
    }

    Ok(report)
}

fn export_conversation<A, S>(
    walker: &PageWalker<'_, A, S>,
    archiver: &ChronologicalArchiver,
    conversation: &Conversation,
    dir: &str,
    kind: ConversationKind,
    page_size: u32,
) -> Result<ConversationReport>
where
    A: ConversationApi + ?Sized,
    S: Sleeper,
{
    let messages = fetch_conversation(walker, &conversation.id, page_size)
        .with_context(|| format!("Failed to fetch history for {}", conversation.display_name()))?;
    let summary = archiver
        .archive(dir, &messages, kind)
        .with_context(|| format!("Failed to archive {}", conversation.display_name()))?;

    info!(
        conversation = conversation.display_name(),
        messages = summary.messages,
        days = summary.days_written,
        "exported"
    );

    Ok(ConversationReport {
        id: conversation.id.clone(),
        kind,
        directory: summary.directory,
        messages: summary.messages,
        days_written: summary.days_written,
        renames: summary.renames,
    })
}

/// Create the directory for `name` under `root`, falling back to a prefixed
/// name when the platform rejects it (e.g. reserved names like `com4`).
/// Returns the directory name actually used.
pub fn prepare_directory(root: &Path, name: &str) -> Result<String, ExportError> {
    let primary = root.join(name);
    match fs::create_dir_all(&primary) {
        Ok(()) => Ok(name.to_string()),
        Err(first) => {
            let fallback = format!("{FALLBACK_DIR_PREFIX}{name}");
            warn!(name, error = %first, "could not create directory; trying {}", fallback);
            let path = root.join(&fallback);
            fs::create_dir_all(&path).map_err(|e| ExportError::io("create directory", &path, e))?;
            Ok(fallback)
        }
    }
}

fn print_plan(plan: &ExportPlan, workspace: &Workspace) {
    print!("{}", render_plan(plan, workspace));
}

/// Dry-run listing. Kinds with nothing selected are left out.
fn render_plan(plan: &ExportPlan, workspace: &Workspace) -> String {
    let mut out = String::new();
    let mut section = |count: usize, noun: &str, heading: &str, names: Vec<String>| {
        if count == 0 {
            return;
        }
        out.push_str(&format!("Fetching {count} {noun}\n{heading}\n"));
        for name in names {
            out.push_str(&name);
            out.push('\n');
        }
        out.push('\n');
    };

    section(
        plan.channels.len(),
        "public channels",
        "Public Channels selected for export:",
        plan.channels.iter().map(|c| c.display_name().to_string()).collect(),
    );
    section(
        plan.groups.len(),
        "Private Channels and Group DMs",
        "Private Channels and Group DMs selected for export:",
        plan.groups.iter().map(|g| g.display_name().to_string()).collect(),
    );
    section(
        plan.dms.len(),
        "1:1 DMs",
        "1:1 DMs selected for export:",
        plan.dms.iter().map(|dm| workspace.dm_label(dm)).collect(),
    );

    out
}
