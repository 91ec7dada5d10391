//! Filesystem side of the archiver: day files and directory moves.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::ExportError;
use crate::message::Message;

/// Write `messages` as a pretty-printed JSON array (4-space indent),
/// replacing any existing file. Creates the parent directory if needed.
/// Returns false without touching disk when there is nothing to write.
pub fn write_day_file(path: &Path, messages: &[&Message]) -> Result<bool, ExportError> {
    if messages.is_empty() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ExportError::io("create directory", parent, e))?;
    }

    let contents = to_pretty_json(&messages).map_err(|source| ExportError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, contents).map_err(|e| ExportError::io("write", path, e))?;
    Ok(true)
}

/// Pretty JSON with the 4-space indent viewers of these exports expect
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Move every entry of `from` into `to`, then remove `from`.
/// Returns false when `from` does not exist (nothing written yet).
pub fn relocate_directory(from: &Path, to: &Path) -> Result<bool, ExportError> {
    if !from.is_dir() || from == to {
        return Ok(false);
    }

    fs::create_dir_all(to).map_err(|e| ExportError::io("create directory", to, e))?;

    let entries = fs::read_dir(from).map_err(|e| ExportError::io("read directory", from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ExportError::io("read directory", from, e))?;
        let target = to.join(entry.file_name());
        fs::rename(entry.path(), &target).map_err(|e| ExportError::io("move", entry.path(), e))?;
    }

    fs::remove_dir(from).map_err(|e| ExportError::io("remove directory", from, e))?;
    Ok(true)
}
