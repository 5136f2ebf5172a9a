//! Fuzz target for snapshot allocation.
//!
//! Arbitrary feeds (unsorted, duplicated, regressing) must allocate without
//! panicking, and never hand out more than the observed increase.

#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, Utc};
use libfuzzer_sys::fuzz_target;
use tally_core::allocate::SnapshotAllocator;
use tally_core::model::Snapshot;

#[derive(Debug, Arbitrary)]
struct Reading {
    // Seconds within roughly a year so spans stay realistic
    offset_secs: u32,
    count: u32,
}

fuzz_target!(|readings: Vec<Reading>| {
    let base = DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_000);
    let snapshots: Vec<Snapshot> = readings
        .iter()
        .take(256)
        .map(|r| {
            let at = base + chrono::Duration::seconds(i64::from(r.offset_secs % 31_536_000));
            Snapshot::new(at, u64::from(r.count))
        })
        .collect();

    let report = SnapshotAllocator::default().allocate(&snapshots);
    let peak = snapshots.iter().map(|s| s.cumulative_count).max().unwrap_or(0);
    for interval in &report.intervals {
        assert!(interval.allocated() <= peak);
    }
});
