//! Records exchanged between the engine and its stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One reading of the cumulative counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Accepts any RFC 3339 offset on input; stored as UTC.
    pub timestamp: DateTime<Utc>,
    pub cumulative_count: u64,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, cumulative_count: u64) -> Self {
        Snapshot {
            timestamp,
            cumulative_count,
        }
    }
}

/// Count attributed to one calendar day of the reference zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub count: u64,
    /// `true` when derived from snapshot interpolation, `false` for a
    /// directly captured full-day count.
    pub is_calculated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyRecord {
    pub fn calculated(date: NaiveDate, count: u64) -> Self {
        DailyRecord {
            date,
            count,
            is_calculated: true,
            source: Some("allocation".to_string()),
            updated_at: None,
        }
    }

    pub fn captured(date: NaiveDate, count: u64, source: impl Into<String>) -> Self {
        DailyRecord {
            date,
            count,
            is_calculated: false,
            source: Some(source.into()),
            updated_at: None,
        }
    }

    pub fn touched(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }
}
