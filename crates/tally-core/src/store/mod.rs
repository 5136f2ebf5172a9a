//! Persistent state for the batch binary.
//!
//! Layout under the data directory:
//! - `daily.json`: daily records, rewritten atomically on save
//! - `forecasts.jsonl`: forecast history, one result per line, append-only
//! - `snapshots.jsonl`: raw counter readings, append-only
//!
//! All stores assume a single writer per data directory.

pub mod daily;
pub mod history;
pub mod snapshots;

pub use daily::{
    merge_increments, record_capture, DailyStore, JsonDailyStore, MemoryDailyStore, MergeOutcome,
    MergePolicy, MergeSummary,
};
pub use history::ForecastHistory;
pub use snapshots::{RecordOutcome, SnapshotLog};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Explicit data directory override.
pub const ENV_DATA_DIR: &str = "TALLY_DATA";

const DIR_NAME: &str = "tally";
const DAILY_FILE: &str = "daily.json";
const HISTORY_FILE: &str = "forecasts.jsonl";
const SNAPSHOTS_FILE: &str = "snapshots.jsonl";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to resolve data dir (pass --data-dir, or set TALLY_DATA or XDG_DATA_HOME)")]
    DataDirUnavailable,

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<StoreError> for tally_common::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Json { path, source } => tally_common::Error::StoreCorrupted {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            StoreError::Io { path, source } => tally_common::Error::Io(std::io::Error::new(
                source.kind(),
                format!("{}: {}", path.display(), source),
            )),
            StoreError::DataDirUnavailable => {
                tally_common::Error::Config(StoreError::DataDirUnavailable.to_string())
            }
        }
    }
}

/// Resolved data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataDir { root: root.into() }
    }

    /// Resolve: CLI path, then `TALLY_DATA`, then `XDG_DATA_HOME/tally`,
    /// then the platform data dir.
    pub fn resolve(cli: Option<&Path>) -> Result<Self, StoreError> {
        if let Some(path) = cli {
            return Ok(DataDir::new(path));
        }
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            return Ok(DataDir::new(dir));
        }
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return Ok(DataDir::new(PathBuf::from(xdg).join(DIR_NAME)));
        }
        dirs::data_dir()
            .map(|base| DataDir::new(base.join(DIR_NAME)))
            .ok_or(StoreError::DataDirUnavailable)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn daily_path(&self) -> PathBuf {
        self.root.join(DAILY_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    pub fn snapshots_path(&self) -> PathBuf {
        self.root.join(SNAPSHOTS_FILE)
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `value` as pretty JSON via a temp file and rename.
pub(crate) fn write_json_pretty_atomic<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let content = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("store.json");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        let mut file = std::fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        file.write_all(&content).map_err(io_err(&tmp_path))?;
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path).map_err(io_err(path))
}

/// Read a JSON document; a missing file yields `None`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|e| StoreError::Json {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Append one JSON line, creating the file and its parent as needed.
pub(crate) fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let line = serde_json::to_string(value).map_err(|e| StoreError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err(path))?;
    writeln!(file, "{}", line).map_err(io_err(path))?;
    let _ = file.sync_all();
    Ok(())
}

/// Read every non-blank JSON line; a missing file is empty.
pub(crate) fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err(path)(e)),
    };
    let mut out = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_err(path))?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| StoreError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        out.push(value);
    }
    Ok(out)
}
