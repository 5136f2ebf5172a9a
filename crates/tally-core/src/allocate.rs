//! Snapshot allocation: spreading counter deltas over calendar days.
//!
//! Each consecutive pair of snapshots contributes its count delta to the
//! reference-zone days the interval overlaps, proportional to overlap time.
//! Per-day shares are floored, so an interval spanning `k` days may lose at
//! most `k - 1` units to truncation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tally_common::{Error, Result};
use tally_config::ForecastConfig;
use tracing::{debug, warn};

use crate::calendar::ReferenceZone;
use crate::model::Snapshot;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// One day's share of an interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayShare {
    pub date: NaiveDate,
    pub overlap_hours: f64,
    pub count: u64,
}

/// Allocation of a single snapshot pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalAllocation {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count_diff: u64,
    pub hours: f64,
    pub hourly_rate: f64,
    pub days: Vec<DayShare>,
}

impl IntervalAllocation {
    pub fn allocated(&self) -> u64 {
        self.days.iter().map(|d| d.count).sum()
    }

    /// Units lost to per-day flooring.
    pub fn truncated(&self) -> u64 {
        self.count_diff - self.allocated()
    }
}

/// A snapshot pair excluded from allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AllocationAnomaly {
    /// The later reading is lower than the earlier one.
    CounterRegression {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        from: u64,
        to: u64,
    },
    /// The pair does not span positive time (duplicate timestamp).
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl AllocationAnomaly {
    fn from_error(err: &Error) -> Option<Self> {
        match *err {
            Error::CounterRegression {
                start,
                end,
                from,
                to,
            } => Some(AllocationAnomaly::CounterRegression {
                start,
                end,
                from,
                to,
            }),
            Error::InvalidInterval { start, end } => {
                Some(AllocationAnomaly::InvalidInterval { start, end })
            }
            _ => None,
        }
    }

    pub fn to_error(&self) -> Error {
        match *self {
            AllocationAnomaly::CounterRegression {
                start,
                end,
                from,
                to,
            } => Error::CounterRegression {
                start,
                end,
                from,
                to,
            },
            AllocationAnomaly::InvalidInterval { start, end } => {
                Error::InvalidInterval { start, end }
            }
        }
    }
}

/// Result of allocating a whole snapshot sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    /// Date → incremental count, summed over all intervals.
    pub increments: BTreeMap<NaiveDate, u64>,
    pub intervals: Vec<IntervalAllocation>,
    pub anomalies: Vec<AllocationAnomaly>,
}

impl AllocationReport {
    pub fn total_allocated(&self) -> u64 {
        self.increments.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.anomalies.len()
    }
}

/// Distributes snapshot deltas across reference-zone calendar days.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotAllocator {
    zone: ReferenceZone,
}

impl SnapshotAllocator {
    pub fn new(zone: ReferenceZone) -> Self {
        SnapshotAllocator { zone }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        SnapshotAllocator::new(ReferenceZone::from_config(config))
    }

    pub fn zone(&self) -> ReferenceZone {
        self.zone
    }

    /// Allocate one consecutive pair.
    ///
    /// Fails with `InvalidInterval` when `curr` is not strictly after `prev`
    /// and with `CounterRegression` when the count went down.
    pub fn allocate_pair(&self, prev: &Snapshot, curr: &Snapshot) -> Result<IntervalAllocation> {
        let span_ms = (curr.timestamp - prev.timestamp).num_milliseconds();
        if span_ms <= 0 {
            return Err(Error::InvalidInterval {
                start: prev.timestamp,
                end: curr.timestamp,
            });
        }
        if curr.cumulative_count < prev.cumulative_count {
            return Err(Error::CounterRegression {
                start: prev.timestamp,
                end: curr.timestamp,
                from: prev.cumulative_count,
                to: curr.cumulative_count,
            });
        }

        let count_diff = curr.cumulative_count - prev.cumulative_count;
        let hours = span_ms as f64 / MS_PER_HOUR;
        let mut days = Vec::new();

        for date in self.zone.days_spanned(prev.timestamp, curr.timestamp) {
            let from = prev.timestamp.max(self.zone.day_start(date));
            let to = curr.timestamp.min(self.zone.day_end(date));
            let overlap_ms = (to - from).num_milliseconds();
            if overlap_ms <= 0 {
                continue;
            }
            // Integer arithmetic keeps exact splits exact.
            let count = (u128::from(count_diff) * overlap_ms as u128 / span_ms as u128) as u64;
            days.push(DayShare {
                date,
                overlap_hours: overlap_ms as f64 / MS_PER_HOUR,
                count,
            });
        }

        Ok(IntervalAllocation {
            start: prev.timestamp,
            end: curr.timestamp,
            count_diff,
            hours,
            hourly_rate: count_diff as f64 / hours,
            days,
        })
    }

    /// Allocate every consecutive pair of `snapshots` (sorted here by time).
    ///
    /// Invalid or regressing pairs are skipped and reported in
    /// [`AllocationReport::anomalies`]; the rest of the batch still runs.
    pub fn allocate(&self, snapshots: &[Snapshot]) -> AllocationReport {
        let mut sorted = snapshots.to_vec();
        sorted.sort_by_key(|s| s.timestamp);

        let mut report = AllocationReport::default();
        for pair in sorted.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            match self.allocate_pair(prev, curr) {
                Ok(interval) => {
                    for share in &interval.days {
                        *report.increments.entry(share.date).or_insert(0) += share.count;
                    }
                    debug!(
                        start = %interval.start,
                        end = %interval.end,
                        count_diff = interval.count_diff,
                        days = interval.days.len(),
                        truncated = interval.truncated(),
                        "interval allocated"
                    );
                    report.intervals.push(interval);
                }
                Err(err) => {
                    warn!(
                        start = %prev.timestamp,
                        end = %curr.timestamp,
                        code = err.code(),
                        "skipping interval: {}",
                        err
                    );
                    if let Some(anomaly) = AllocationAnomaly::from_error(&err) {
                        report.anomalies.push(anomaly);
                    }
                }
            }
        }
        report
    }
}
