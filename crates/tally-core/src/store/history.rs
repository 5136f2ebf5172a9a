//! Append-only forecast history.

use std::path::{Path, PathBuf};

use super::{append_jsonl, read_jsonl, StoreError};
use crate::result::ForecastResult;

/// Forecast results in the order they were produced.
#[derive(Debug)]
pub struct ForecastHistory {
    path: PathBuf,
    entries: Vec<ForecastResult>,
}

impl ForecastHistory {
    /// Load `path`; a missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = read_jsonl(&path)?;
        Ok(ForecastHistory { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[ForecastResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` results, oldest first.
    pub fn recent(&self, n: usize) -> &[ForecastResult] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }

    /// Persist `result` as a new line and keep it in memory.
    pub fn append(&mut self, result: ForecastResult) -> Result<(), StoreError> {
        append_jsonl(&self.path, &result)?;
        self.entries.push(result);
        Ok(())
    }
}
