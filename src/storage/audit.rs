//! Append-only audit log of publish attempts
//!
//! Every publish attempt leaves exactly one entry, whether it succeeded,
//! failed or was skipped. Entries are never mutated; the only write
//! operation is an append, with the oldest entries trimmed once the
//! configured retention cap is reached.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::scheduler::planner::PostKind;

/// Default retention cap when none is configured
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Outcome of a publish attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Primary send accepted by the channel
    Success,
    /// Primary send failed
    Error,
    /// No channel call was made (exhausted or already-published slot, or
    /// skipped follow-up)
    Skipped,
}

/// Outcome of one secondary follow-up send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAttempt {
    /// Position within the secondary payload list
    pub index: usize,

    /// Outcome of this follow-up
    pub status: PostStatus,

    /// Error text when the follow-up failed or was skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Immutable record of a single publish attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Time the attempt was recorded
    pub timestamp: DateTime<Utc>,

    /// Item involved, if any (quota/exhaustion skips carry none)
    #[serde(default)]
    pub item_id: Option<String>,

    /// Attempt outcome
    pub status: PostStatus,

    /// Channel message id for successful sends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_message_id: Option<String>,

    /// Error text for failed sends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Rotation rule or manual path behind the attempt
    #[serde(default)]
    pub kind: Option<PostKind>,

    /// Technical window position at the time of the attempt
    pub cycle_day: usize,

    /// Humanitarian index at the time of the attempt
    pub humanitarian_index: usize,

    /// Outcomes of the secondary follow-up sends
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_attempts: Vec<SubAttempt>,
}

impl AuditEntry {
    /// Start a new entry stamped now
    pub fn new(status: PostStatus, cycle_day: usize, humanitarian_index: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            item_id: None,
            status,
            external_message_id: None,
            error: None,
            kind: None,
            cycle_day,
            humanitarian_index,
            sub_attempts: Vec::new(),
        }
    }

    /// Set the item id
    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    /// Set the post kind
    pub fn with_kind(mut self, kind: PostKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the channel message id
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.external_message_id = Some(message_id.into());
        self
    }

    /// Set the error text
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach secondary-send outcomes
    pub fn with_sub_attempts(mut self, sub_attempts: Vec<SubAttempt>) -> Self {
        self.sub_attempts = sub_attempts;
        self
    }
}

/// File-backed audit log with bounded retention
///
/// The log is a JSON array; appends are read-modify-write against the
/// whole file, which is acceptable at four entries a day.
pub struct AuditLog {
    path: PathBuf,
    max_entries: usize,
}

impl AuditLog {
    /// Create a log at the given path with the default retention cap
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Set the retention cap
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, trimming the oldest past the retention cap
    pub fn append(&self, entry: AuditEntry) -> Result<()> {
        let mut entries = self.read_all();
        entries.push(entry);

        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(0..excess);
        }

        self.write_all(&entries)
    }

    /// Last `n` entries, oldest first
    pub fn tail(&self, n: usize) -> Vec<AuditEntry> {
        let entries = self.read_all();
        let skip = entries.len().saturating_sub(n);
        entries.into_iter().skip(skip).collect()
    }

    /// Total number of retained entries
    pub fn len(&self) -> usize {
        self.read_all().len()
    }

    /// Whether the log has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_all(&self) -> Vec<AuditEntry> {
        if !self.path.exists() {
            return Vec::new();
        }

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to open audit log");
                return Vec::new();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt audit log, starting empty");
                Vec::new()
            }
        }
    }

    fn write_all(&self, entries: &[AuditEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit directory: {}", parent.display())
                })?;
            }
        }

        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path)
            .with_context(|| format!("Failed to create audit file: {}", temp_path.display()))?;

        serde_json::to_writer_pretty(BufWriter::new(file), entries)
            .context("Failed to serialize audit log")?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename audit file: {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(item: &str, status: PostStatus) -> AuditEntry {
        AuditEntry::new(status, 0, 0)
            .with_item(item)
            .with_kind(PostKind::Technical)
    }

    #[test]
    fn test_append_and_tail() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.json"));

        log.append(entry("a1", PostStatus::Success)).unwrap();
        log.append(entry("a2", PostStatus::Skipped)).unwrap();
        log.append(entry("a3", PostStatus::Error)).unwrap();

        let tail = log.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].item_id.as_deref(), Some("a2"));
        assert_eq!(tail[1].item_id.as_deref(), Some("a3"));
    }

    #[test]
    fn test_tail_more_than_available() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.json"));

        log.append(entry("a1", PostStatus::Success)).unwrap();
        assert_eq!(log.tail(10).len(), 1);
    }

    #[test]
    fn test_retention_trims_oldest() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.json")).with_max_entries(3);

        for i in 0..5 {
            log.append(entry(&format!("a{i}"), PostStatus::Success)).unwrap();
        }

        let all = log.tail(10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].item_id.as_deref(), Some("a2"));
        assert_eq!(all[2].item_id.as_deref(), Some("a4"));
    }

    #[test]
    fn test_corrupt_log_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.json");
        fs::write(&path, "[{broken").unwrap();

        let log = AuditLog::new(&path);
        assert!(log.is_empty());

        log.append(entry("a1", PostStatus::Success)).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_entry_builder() {
        let e = AuditEntry::new(PostStatus::Success, 2, 1)
            .with_item("a1")
            .with_kind(PostKind::Humanitarian)
            .with_message_id("m-7")
            .with_sub_attempts(vec![SubAttempt {
                index: 0,
                status: PostStatus::Error,
                error: Some("timeout".to_string()),
            }]);

        assert_eq!(e.cycle_day, 2);
        assert_eq!(e.humanitarian_index, 1);
        assert_eq!(e.external_message_id.as_deref(), Some("m-7"));
        assert_eq!(e.sub_attempts.len(), 1);
    }

    #[test]
    fn test_entry_json_shape() {
        let e = entry("a1", PostStatus::Skipped);
        let json = serde_json::to_value(&e).unwrap();

        assert_eq!(json["status"], "skipped");
        assert_eq!(json["kind"], "technical");
        // Empty sub-attempt lists are elided
        assert!(json.get("sub_attempts").is_none());
    }
}
