//! Durable index state: one JSON document mapping source path to its
//! modification time and the vector IDs it produced.
//!
//! The file is read and written wholesale once per indexing run. Writes go
//! through a temp file + rename so a crashed run never leaves a truncated
//! snapshot behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::IndexError;

/// State entry for one indexed source file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Modification time in milliseconds since the epoch.
    pub mtime: u64,
    /// Vector-store point IDs produced from this file, in upsert order.
    pub chunk_ids: Vec<String>,
}

/// The whole durable snapshot. `BTreeMap` keeps the serialized form stable.
pub type IndexState = BTreeMap<String, FileEntry>;

/// Loads the snapshot; `None` when the file does not exist yet.
///
/// # Errors
/// Returns [`IndexError::Io`] / [`IndexError::Parse`] for unreadable or
/// corrupt files; those are not silently treated as "never indexed".
pub fn load_state(path: &Path) -> Result<Option<IndexState>, IndexError> {
    if !path.exists() {
        debug!("no state file at {:?}", path);
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Persists the snapshot atomically (temp file + rename).
pub fn persist_state(path: &Path, state: &IndexState) -> Result<(), IndexError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(state)?)?;
    fs::rename(&tmp, path)?;
    debug!(entries = state.len(), "persisted index state to {:?}", path);
    Ok(())
}
