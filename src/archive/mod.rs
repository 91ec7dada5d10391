//! Chronological archiving of a conversation into per-day JSON files.
//!
//! Input is one conversation's merged message stream in ascending order.
//! Output is `<root>/<conversation dir>/<YYYY-MM-DD>.json`, one file per UTC
//! day that has messages. Rename events in the stream move everything written
//! so far to the new directory name.

mod writer;

pub use writer::{relocate_directory, to_pretty_json, write_day_file};

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ExportError;
use crate::message::Message;

/// Kind of conversation being archived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    /// Public channel
    Channel,
    /// Private channel or group DM
    Group,
    /// 1:1 direct message
    Im,
}

impl ConversationKind {
    /// Whether `subtype` marks a rename of this kind of conversation.
    /// DMs have no name and never rename.
    pub fn is_rename_subtype(&self, subtype: &str) -> bool {
        match self {
            ConversationKind::Channel => subtype == "channel_name",
            ConversationKind::Group => subtype == "group_name" || subtype == "channel_name",
            ConversationKind::Im => false,
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationKind::Channel => "channel",
            ConversationKind::Group => "group",
            ConversationKind::Im => "im",
        };
        f.write_str(name)
    }
}

/// A name change found in the message stream.
///
/// `old_name` is what the server reported and is only logged; files are
/// always moved out of the directory the archiver has been writing to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEvent {
    pub old_name: String,
    pub new_name: String,
}

impl RenameEvent {
    /// Extract a rename from `message`. A missing `old_name` falls back to
    /// `current_dir`.
    pub fn from_message(message: &Message, kind: ConversationKind, current_dir: &str) -> Option<Self> {
        let subtype = message.subtype.as_deref()?;
        if !kind.is_rename_subtype(subtype) {
            return None;
        }

        let Some(new_name) = message.str_field("name") else {
            warn!(ts = %message.ts, subtype, "rename event without a new name; ignoring");
            return None;
        };

        Some(Self {
            old_name: message
                .str_field("old_name")
                .unwrap_or(current_dir)
                .to_string(),
            new_name: new_name.to_string(),
        })
    }
}

/// What one `archive` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Directory name in use after the last message
    pub directory: String,
    pub messages: usize,
    pub days_written: usize,
    pub renames: usize,
}

/// Writes conversations under a fixed export root
#[derive(Debug, Clone)]
pub struct ChronologicalArchiver {
    root: PathBuf,
}

impl ChronologicalArchiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partition `messages` (ascending) into day files under `conversation_dir`.
    ///
    /// A day is flushed when the next message falls on a different UTC date;
    /// the last day is flushed after the loop. Existing day files are
    /// overwritten. A rename moves already-written files and redirects later
    /// flushes, including the day currently being buffered.
    pub fn archive(
        &self,
        conversation_dir: &str,
        messages: &[Message],
        kind: ConversationKind,
    ) -> Result<ArchiveSummary, ExportError> {
        let mut summary = ArchiveSummary {
            directory: conversation_dir.to_string(),
            messages: messages.len(),
            ..Default::default()
        };
        let mut current_day: Option<NaiveDate> = None;
        let mut buffer: Vec<&Message> = Vec::new();

        for message in messages {
            let day = message.timestamp()?.utc_day()?;

            if current_day != Some(day) {
                if let Some(previous) = current_day {
                    if self.flush(&summary.directory, previous, &buffer)? {
                        summary.days_written += 1;
                    }
                }
                buffer.clear();
                current_day = Some(day);
            }

            if let Some(event) = RenameEvent::from_message(message, kind, &summary.directory) {
                self.apply_rename(&summary.directory, &event)?;
                summary.directory = event.new_name;
                summary.renames += 1;
            }

            buffer.push(message);
        }

        if let Some(day) = current_day {
            if self.flush(&summary.directory, day, &buffer)? {
                summary.days_written += 1;
            }
        }

        debug!(
            directory = %summary.directory,
            kind = %kind,
            days = summary.days_written,
            "archived conversation"
        );
        Ok(summary)
    }

    /// Path of the day file for `day` under `directory`
    pub fn day_file(&self, directory: &str, day: NaiveDate) -> PathBuf {
        self.root
            .join(directory)
            .join(format!("{}.json", day.format("%Y-%m-%d")))
    }

    fn flush(&self, directory: &str, day: NaiveDate, buffer: &[&Message]) -> Result<bool, ExportError> {
        write_day_file(&self.day_file(directory, day), buffer)
    }

    /// Move what was written under `current` to the event's new name.
    /// The reported old name may belong to another conversation by now.
    fn apply_rename(&self, current: &str, event: &RenameEvent) -> Result<(), ExportError> {
        if current == event.new_name {
            debug!(directory = current, reported_old = %event.old_name, "rename to the directory in use");
            return Ok(());
        }

        let moved = relocate_directory(&self.root.join(current), &self.root.join(&event.new_name))?;
        if moved {
            info!(from = current, to = %event.new_name, reported_old = %event.old_name, "conversation renamed; moved archived days");
        } else {
            debug!(from = current, to = %event.new_name, "conversation renamed; nothing to move");
        }
        Ok(())
    }
}
