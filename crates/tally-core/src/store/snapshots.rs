//! Append-only log of raw counter readings.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{append_jsonl, read_jsonl, StoreError};
use crate::model::Snapshot;

/// Result of offering a reading to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RecordOutcome {
    Appended,
    /// Same count as the last reading, taken at `since`; not stored.
    Unchanged { since: DateTime<Utc> },
}

#[derive(Debug)]
pub struct SnapshotLog {
    path: PathBuf,
    snapshots: Vec<Snapshot>,
}

impl SnapshotLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshots = read_jsonl(&path)?;
        Ok(SnapshotLog { path, snapshots })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Readings in recorded order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Most recently recorded reading.
    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Append `snapshot` unless its count equals the last recorded count.
    pub fn record(&mut self, snapshot: Snapshot) -> Result<RecordOutcome, StoreError> {
        if let Some(last) = self.last() {
            if last.cumulative_count == snapshot.cumulative_count {
                return Ok(RecordOutcome::Unchanged {
                    since: last.timestamp,
                });
            }
        }
        append_jsonl(&self.path, &snapshot)?;
        self.snapshots.push(snapshot);
        Ok(RecordOutcome::Appended)
    }
}
