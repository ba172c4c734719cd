//! Snapshot of the most recent full sync, written with atomic replaces.
//!
//! The file is a pretty-printed JSON array of the raw check-in records.
//! It exists for people to inspect; nothing reads it back at startup.

use crate::protocol::models::Record;
use crate::GateError;
use std::fs;
use std::path::{Path, PathBuf};

/// Single overwritten snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Use `path` as the snapshot location. Parent directories are created
    /// on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Overwrite the snapshot with `records`.
    ///
    /// Uses temp file + rename for atomic write.
    pub fn save(&self, records: &[Record]) -> Result<(), GateError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                GateError::SnapshotIO(format!("Failed to create snapshot dir: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(records)
            .map_err(|e| GateError::SnapshotIO(format!("Failed to serialize snapshot: {}", e)))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, json)
            .map_err(|e| GateError::SnapshotIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &self.path)
            .map_err(|e| GateError::SnapshotIO(format!("Failed to rename snapshot: {}", e)))?;

        Ok(())
    }

    /// Load the snapshot, if one has been written.
    #[cfg(test)]
    pub fn load(&self) -> Result<Option<Vec<Record>>, GateError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| GateError::SnapshotIO(format!("Failed to read snapshot: {}", e)))?;

        let records = serde_json::from_str(&json)
            .map_err(|e| GateError::SnapshotIO(format!("Failed to parse snapshot: {}", e)))?;
        Ok(Some(records))
    }
}
