//! Workspace-level JSON files written next to the conversation directories.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::Workspace;
use crate::api::Conversation;
use crate::archive::to_pretty_json;
use crate::error::ExportError;

/// Write users.json, channels.json, groups.json, mpims.json and dms.json
/// under `root`, replacing earlier copies.
pub fn write_metadata(root: &Path, workspace: &Workspace) -> Result<(), ExportError> {
    info!("Making users and channels files");

    write_json(&root.join("users.json"), &workspace.users)?;
    write_json(&root.join("channels.json"), &workspace.channels)?;

    let (mpims, private): (Vec<&Conversation>, Vec<&Conversation>) =
        workspace.groups.iter().partition(|g| g.is_mpim);
    write_json(&root.join("groups.json"), &private)?;
    write_json(&root.join("mpims.json"), &mpims)?;

    // Viewers expect DMs to carry both participants as members
    let owner = workspace.identity.user_id.as_str();
    let dms: Vec<Conversation> = workspace
        .dms
        .iter()
        .map(|dm| {
            let mut dm = dm.clone();
            let other = dm.user.clone().unwrap_or_default();
            dm.members = Some(vec![other, owner.to_string()]);
            dm
        })
        .collect();
    write_json(&root.join("dms.json"), &dms)?;

    Ok(())
}

/// Create an empty day file for the first public channel.
///
/// Viewers fail to open an export with no public channel directory, so this
/// is used when only private conversations were exported.
pub fn write_placeholder_channel(
    root: &Path,
    workspace: &Workspace,
    today: NaiveDate,
) -> Result<bool, ExportError> {
    let Some(channel) = workspace.channels.first() else {
        return Ok(false);
    };

    let dir = root.join(channel.display_name());
    fs::create_dir_all(&dir).map_err(|e| ExportError::io("create directory", &dir, e))?;

    let empty: Vec<serde_json::Value> = Vec::new();
    write_json(&dir.join(format!("{}.json", today.format("%Y-%m-%d"))), &empty)?;
    Ok(true)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ExportError> {
    let contents = to_pretty_json(value).map_err(|source| ExportError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, contents).map_err(|e| ExportError::io("write", path, e))
}
