//! Daily record repository and the allocation merge rule.
//!
//! Calculated records are refreshed on every allocation pass. Records that
//! were captured directly are authoritative and survive a merge unless the
//! caller opts in with [`MergePolicy::overwrite_captured`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_common::SCHEMA_VERSION;

use super::{read_json, write_json_pretty_atomic, StoreError};
use crate::model::DailyRecord;

/// Keyed access to daily records.
pub trait DailyStore {
    fn get(&self, date: NaiveDate) -> Option<DailyRecord>;

    /// Insert or replace the record for `record.date`.
    fn upsert(&mut self, record: DailyRecord);

    /// All records, date ascending.
    fn records(&self) -> Vec<DailyRecord>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryDailyStore {
    records: BTreeMap<NaiveDate, DailyRecord>,
}

impl MemoryDailyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DailyStore for MemoryDailyStore {
    fn get(&self, date: NaiveDate) -> Option<DailyRecord> {
        self.records.get(&date).cloned()
    }

    fn upsert(&mut self, record: DailyRecord) {
        self.records.insert(record.date, record);
    }

    fn records(&self) -> Vec<DailyRecord> {
        self.records.values().cloned().collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DailyDocument {
    schema_version: String,
    records: Vec<DailyRecord>,
}

/// File-backed store: loaded on open, written by [`JsonDailyStore::save`].
#[derive(Debug)]
pub struct JsonDailyStore {
    path: PathBuf,
    inner: MemoryDailyStore,
    dirty: bool,
}

impl JsonDailyStore {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut inner = MemoryDailyStore::new();
        if let Some(doc) = read_json::<DailyDocument>(&path)? {
            for record in doc.records {
                inner.upsert(record);
            }
        }
        Ok(JsonDailyStore {
            path,
            inner,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write pending changes; a clean store is not rewritten.
    pub fn save(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let doc = DailyDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            records: self.inner.records(),
        };
        write_json_pretty_atomic(&self.path, &doc)?;
        self.dirty = false;
        Ok(())
    }
}

impl DailyStore for JsonDailyStore {
    fn get(&self, date: NaiveDate) -> Option<DailyRecord> {
        self.inner.get(date)
    }

    fn upsert(&mut self, record: DailyRecord) {
        self.inner.upsert(record);
        self.dirty = true;
    }

    fn records(&self) -> Vec<DailyRecord> {
        self.inner.records()
    }
}

/// How allocation results may replace existing records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Allow calculated counts to replace directly captured ones.
    pub overwrite_captured: bool,
}

/// What happened to one date during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    Created,
    /// A calculated record was refreshed.
    Updated { previous: u64 },
    /// A captured record was left alone.
    PreservedCaptured,
    /// A captured record was replaced, as allowed by the policy.
    OverwroteCaptured { previous: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub outcomes: BTreeMap<NaiveDate, MergeOutcome>,
}

impl MergeSummary {
    fn count(&self, pred: impl Fn(&MergeOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, MergeOutcome::Created))
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, MergeOutcome::Updated { .. }))
    }

    pub fn preserved(&self) -> usize {
        self.count(|o| matches!(o, MergeOutcome::PreservedCaptured))
    }

    pub fn overwritten(&self) -> usize {
        self.count(|o| matches!(o, MergeOutcome::OverwroteCaptured { .. }))
    }
}

/// Merge allocated day increments into `store`.
pub fn merge_increments<S: DailyStore + ?Sized>(
    store: &mut S,
    increments: &BTreeMap<NaiveDate, u64>,
    policy: MergePolicy,
    now: DateTime<Utc>,
) -> MergeSummary {
    let mut summary = MergeSummary::default();
    for (&date, &count) in increments {
        let outcome = match store.get(date) {
            None => MergeOutcome::Created,
            Some(existing) if existing.is_calculated => MergeOutcome::Updated {
                previous: existing.count,
            },
            Some(existing) if policy.overwrite_captured => MergeOutcome::OverwroteCaptured {
                previous: existing.count,
            },
            Some(_) => MergeOutcome::PreservedCaptured,
        };
        if outcome != MergeOutcome::PreservedCaptured {
            store.upsert(DailyRecord::calculated(date, count).touched(now));
        }
        summary.outcomes.insert(date, outcome);
    }
    summary
}

/// Store a directly captured full-day count, returning the record it replaced.
pub fn record_capture<S: DailyStore + ?Sized>(
    store: &mut S,
    date: NaiveDate,
    count: u64,
    source: &str,
    now: DateTime<Utc>,
) -> Option<DailyRecord> {
    let previous = store.get(date);
    store.upsert(DailyRecord::captured(date, count, source).touched(now));
    previous
}
