//! Allocation properties over arbitrary snapshot pairs and batches.
//!
//! Conservation within the truncation bound, regression exclusion, and
//! batches that keep going past bad intervals.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use tally_core::allocate::{AllocationAnomaly, SnapshotAllocator};
use tally_core::calendar::ReferenceZone;
use tally_core::model::Snapshot;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

fn snap(ts: &str, count: u64) -> Snapshot {
    Snapshot::new(ts.parse().unwrap(), count)
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

proptest! {
    #[test]
    fn allocation_conserves_within_truncation(
        start_secs in 0i64..10_000_000,
        span_secs in 1i64..600_000,
        c0 in 0u64..10_000,
        diff in 0u64..200_000,
    ) {
        let t0 = base() + Duration::seconds(start_secs);
        let t1 = t0 + Duration::seconds(span_secs);
        let allocator = SnapshotAllocator::default();
        let interval = allocator
            .allocate_pair(&Snapshot::new(t0, c0), &Snapshot::new(t1, c0 + diff))
            .unwrap();

        let k = interval.days.len() as u64;
        let total = interval.allocated();
        prop_assert!(k >= 1);
        prop_assert!(total <= diff);
        prop_assert!(total + (k - 1) >= diff, "lost {} over {} days", diff - total, k);
        prop_assert_eq!(interval.truncated(), diff - total);
    }

    #[test]
    fn regressions_never_allocate(
        start_secs in 0i64..10_000_000,
        span_secs in 1i64..600_000,
        c1 in 0u64..10_000,
        drop in 1u64..10_000,
    ) {
        let t0 = base() + Duration::seconds(start_secs);
        let t1 = t0 + Duration::seconds(span_secs);
        let report = SnapshotAllocator::default()
            .allocate(&[Snapshot::new(t0, c1 + drop), Snapshot::new(t1, c1)]);

        prop_assert!(report.increments.is_empty());
        prop_assert_eq!(report.total_allocated(), 0);
        prop_assert_eq!(report.anomalies.len(), 1);
        let is_regression = matches!(
            report.anomalies[0],
            AllocationAnomaly::CounterRegression { .. }
        );
        prop_assert!(is_regression);
    }

    #[test]
    fn days_follow_reference_zone(offset in -12i32..=14, hour in 0u32..24) {
        let zone = ReferenceZone::new(tally_config::forecast::fixed_offset(offset));
        let allocator = SnapshotAllocator::new(zone);
        let t0 = Utc.with_ymd_and_hms(2026, 3, 10, hour, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(1);
        let interval = allocator
            .allocate_pair(&Snapshot::new(t0, 0), &Snapshot::new(t1, 60))
            .unwrap();
        for share in &interval.days {
            prop_assert!(zone.day_start(share.date) < t1);
            prop_assert!(zone.day_end(share.date) > t0);
        }
    }
}

#[test]
fn batch_continues_past_regression() {
    let report = SnapshotAllocator::default().allocate(&[
        snap("2026-02-05T12:00:00-05:00", 100),
        snap("2026-02-05T14:00:00-05:00", 90),
        snap("2026-02-05T16:00:00-05:00", 120),
    ]);

    assert_eq!(report.skipped(), 1);
    assert!(!report.is_clean());
    assert_eq!(report.intervals.len(), 1);
    assert_eq!(report.increments.get(&date(2, 5)), Some(&30));
}

#[test]
fn duplicate_timestamp_is_skipped_not_divided() {
    let report = SnapshotAllocator::default().allocate(&[
        snap("2026-02-05T12:00:00-05:00", 100),
        snap("2026-02-05T12:00:00-05:00", 110),
        snap("2026-02-05T18:00:00-05:00", 130),
    ]);

    assert_eq!(report.skipped(), 1);
    assert!(matches!(
        report.anomalies[0],
        AllocationAnomaly::InvalidInterval { .. }
    ));
    assert_eq!(report.total_allocated(), 20);
}

#[test]
fn unsorted_feed_is_ordered_by_time() {
    let report = SnapshotAllocator::default().allocate(&[
        snap("2026-02-06T12:00:00-05:00", 148),
        snap("2026-02-05T12:00:00-05:00", 100),
    ]);

    assert!(report.is_clean());
    assert_eq!(report.increments.get(&date(2, 5)), Some(&24));
    assert_eq!(report.increments.get(&date(2, 6)), Some(&24));
}

#[test]
fn multi_day_gap_spreads_over_every_day() {
    // 72h at one event per hour, midday to midday
    let report = SnapshotAllocator::default().allocate(&[
        snap("2026-02-05T12:00:00-05:00", 0),
        snap("2026-02-08T12:00:00-05:00", 72),
    ]);

    let days: Vec<_> = report.increments.iter().map(|(d, c)| (*d, *c)).collect();
    assert_eq!(
        days,
        vec![(date(2, 5), 12), (date(2, 6), 24), (date(2, 7), 24), (date(2, 8), 12)]
    );
}
