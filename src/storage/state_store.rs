//! File-backed schedule state store
//!
//! The schedule document lives in a single JSON file, loaded once at
//! process start and overwritten in full on every save. Loading never
//! fails: an absent or corrupt document falls back to the defaults so a
//! bad file is a recoverable condition, not a fatal startup error.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::scheduler::state::ScheduleState;

/// Loads and saves the persisted schedule document
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for the given document path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the persisted document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state, or defaults if absent or malformed
    pub fn load(&self) -> ScheduleState {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "No schedule state found, starting fresh");
            return ScheduleState::default();
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to open schedule state, falling back to defaults"
                );
                return ScheduleState::default();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(state) => {
                tracing::debug!(path = %self.path.display(), "Schedule state loaded");
                state
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt schedule state, falling back to defaults"
                );
                ScheduleState::default()
            }
        }
    }

    /// Serialize the full document and overwrite the persisted location
    ///
    /// Writes to a temp file first and renames over the target, so a crash
    /// mid-save leaves the previous document intact.
    pub fn save(&self, state: &ScheduleState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create state file: {}", temp_path.display()))?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, state).context("Failed to serialize schedule state")?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename state file: {}", self.path.display()))?;

        tracing::debug!(path = %self.path.display(), "Schedule state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_default() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        assert_eq!(store.load(), ScheduleState::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let mut state = ScheduleState::default();
        state.cycle_day = 3;
        state.mark_posted("a1");
        state.category_cursor.insert("algorithms".to_string(), 2);

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn test_load_corrupt_returns_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ definitely not json").unwrap();

        let store = StateStore::new(&path);
        assert_eq!(store.load(), ScheduleState::default());
    }

    #[test]
    fn test_load_partial_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"{"humanitarian_index": 1}"#).unwrap();

        let store = StateStore::new(&path);
        let state = store.load();
        assert_eq!(state.humanitarian_index, 1);
        assert_eq!(state.cycle_day, 0);
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("nested/deep/state.json"));

        store.save(&ScheduleState::default()).unwrap();
        assert!(store.path().exists());
    }
}
