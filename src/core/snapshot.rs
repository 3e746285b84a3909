//! Snapshot persistence
//!
//! Snapshots are pretty JSON files named `<stem>.json` under a directory.

use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::types::{EngineSnapshot, SNAPSHOT_VERSION};

/// Save snapshot to a JSON file, returning its path
pub fn save_snapshot(snapshot: &EngineSnapshot, dir: &str) -> EngineResult<String> {
    let filename = format!("{}/{}.json", dir, snapshot.file_stem());

    let json = serde_json::to_string_pretty(snapshot)?;

    std::fs::create_dir_all(dir).map_err(|e| EngineError::storage(dir, e))?;
    std::fs::write(&filename, json).map_err(|e| EngineError::storage(filename.as_str(), e))?;

    Ok(filename)
}

/// Load snapshot from a JSON file
pub fn load_snapshot(path: impl AsRef<Path>) -> EngineResult<EngineSnapshot> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| EngineError::storage(path.display().to_string(), e))?;
    Ok(serde_json::from_str(&json)?)
}

/// Load a snapshot and check it can be restored as-is
pub fn load_and_validate_snapshot(path: impl AsRef<Path>) -> EngineResult<EngineSnapshot> {
    let snapshot = load_snapshot(path)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(EngineError::configuration(format!(
            "snapshot version {} not supported",
            snapshot.version
        )));
    }
    if snapshot.colors.len() != snapshot.round_ids.len() {
        return Err(EngineError::configuration(format!(
            "snapshot has {} colors but {} round ids",
            snapshot.colors.len(),
            snapshot.round_ids.len()
        )));
    }

    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
