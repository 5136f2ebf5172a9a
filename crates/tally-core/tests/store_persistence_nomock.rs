//! Store round trips against a real temporary data directory.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use proptest::prelude::*;
use tally_common::{Error, RunId};
use tally_config::ForecastConfig;
use tally_core::engine::ForecastEngine;
use tally_core::model::{DailyRecord, Snapshot};
use tally_core::result::ForecastResult;
use tally_core::store::{
    merge_increments, record_capture, DailyStore, DataDir, ForecastHistory, JsonDailyStore,
    MergeOutcome, MergePolicy, RecordOutcome, SnapshotLog, StoreError,
};
use tempfile::TempDir;

fn at(ts: &str) -> DateTime<Utc> {
    ts.parse().unwrap()
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
}

fn forecast(count: u64, ts: &str, history: &[ForecastResult]) -> ForecastResult {
    let engine = ForecastEngine::new(&ForecastConfig::builtin()).with_config_hash("cafebabe");
    engine
        .forecast_at(count, at(ts), history, &RunId::new())
        .unwrap()
        .result()
        .cloned()
        .expect("window open")
}

#[test]
fn history_survives_reopen_unchanged() {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path().join("nested"));

    let mut history = ForecastHistory::open(data.history_path()).unwrap();
    assert!(history.is_empty());
    let first = forecast(100, "2026-02-06T12:00:00-05:00", history.entries());
    history.append(first.clone()).unwrap();
    let second = forecast(110, "2026-02-06T14:00:00-05:00", history.entries());
    history.append(second.clone()).unwrap();

    let reopened = ForecastHistory::open(data.history_path()).unwrap();
    assert_eq!(reopened.entries(), &[first.clone(), second.clone()]);
    assert_eq!(reopened.recent(1), &[second.clone()]);
    assert_eq!(reopened.recent(10).len(), 2);
    assert_eq!(reopened.entries()[0].config_hash.as_deref(), Some("cafebabe"));

    let raw = std::fs::read_to_string(data.history_path()).unwrap();
    assert_eq!(raw.lines().count(), 2);
    assert!(raw.lines().all(|l| l.contains("\"run_id\"")));
}

#[test]
fn corrupted_history_is_reported_with_its_path() {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path());
    std::fs::write(data.history_path(), "{\"not\": \"a forecast\"}\n").unwrap();

    let err = ForecastHistory::open(data.history_path()).unwrap_err();
    assert!(matches!(err, StoreError::Json { .. }));
    let err = Error::from(err);
    assert!(matches!(err, Error::StoreCorrupted { ref path, .. } if path.ends_with("forecasts.jsonl")));
}

#[test]
fn daily_store_merge_respects_captured_records() {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path());
    let now = at("2026-02-07T00:00:00Z");

    {
        let mut store = JsonDailyStore::open(data.daily_path()).unwrap();
        record_capture(&mut store, date(5), 40, "report", now);
        store.save().unwrap();
    }

    let increments = [(date(5), 24), (date(6), 24)].into_iter().collect();
    let mut store = JsonDailyStore::open(data.daily_path()).unwrap();
    let summary = merge_increments(&mut store, &increments, MergePolicy::default(), now);
    store.save().unwrap();

    assert_eq!(summary.outcomes[&date(5)], MergeOutcome::PreservedCaptured);
    assert_eq!(summary.outcomes[&date(6)], MergeOutcome::Created);

    let reopened = JsonDailyStore::open(data.daily_path()).unwrap();
    let records = reopened.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].count, 40);
    assert!(!records[0].is_calculated);
    assert_eq!(records[0].source.as_deref(), Some("report"));
    assert_eq!(records[1], DailyRecord::calculated(date(6), 24).touched(now));

    let mut store = reopened;
    let policy = MergePolicy {
        overwrite_captured: true,
    };
    let summary = merge_increments(&mut store, &increments, policy, now);
    assert_eq!(
        summary.outcomes[&date(5)],
        MergeOutcome::OverwroteCaptured { previous: 40 }
    );
    assert_eq!(
        summary.outcomes[&date(6)],
        MergeOutcome::Updated { previous: 24 }
    );
    assert_eq!(store.get(date(5)).unwrap().count, 24);
}

#[test]
fn daily_document_is_versioned_and_has_no_temp_leftovers() {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path());
    let mut store = JsonDailyStore::open(data.daily_path()).unwrap();
    record_capture(&mut store, date(5), 12, "manual", Utc::now());
    store.save().unwrap();

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(data.daily_path()).unwrap()).unwrap();
    assert_eq!(doc["schema_version"], tally_common::SCHEMA_VERSION);
    assert_eq!(doc["records"].as_array().unwrap().len(), 1);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn snapshot_log_dedups_across_reopen() {
    let dir = TempDir::new().unwrap();
    let data = DataDir::new(dir.path());

    let mut log = SnapshotLog::open(data.snapshots_path()).unwrap();
    let first = Snapshot::new(at("2026-02-05T12:00:00-05:00"), 100);
    assert_eq!(log.record(first).unwrap(), RecordOutcome::Appended);

    let mut log = SnapshotLog::open(data.snapshots_path()).unwrap();
    let same = Snapshot::new(at("2026-02-05T12:05:00-05:00"), 100);
    assert_eq!(
        log.record(same).unwrap(),
        RecordOutcome::Unchanged {
            since: first.timestamp
        }
    );
    let next = Snapshot::new(at("2026-02-05T12:10:00-05:00"), 103);
    assert_eq!(log.record(next).unwrap(), RecordOutcome::Appended);

    let reopened = SnapshotLog::open(data.snapshots_path()).unwrap();
    assert_eq!(reopened.snapshots(), &[first, next]);
}

#[test]
fn data_dir_layout() {
    let data = DataDir::new("/var/lib/tally");
    assert_eq!(data.daily_path().file_name().unwrap(), "daily.json");
    assert_eq!(data.history_path().file_name().unwrap(), "forecasts.jsonl");
    assert_eq!(data.snapshots_path().file_name().unwrap(), "snapshots.jsonl");

    let explicit = DataDir::resolve(Some(std::path::Path::new("/tmp/x"))).unwrap();
    assert_eq!(explicit.root(), std::path::Path::new("/tmp/x"));
}

fn float_bits(result: &ForecastResult) -> Vec<u64> {
    let mut bits = vec![
        result.daily_rate.to_bits(),
        result.lambda_observed.to_bits(),
        result.lambda_combined.to_bits(),
        result.blend_weight.to_bits(),
        result.progress_pct.to_bits(),
        result.bucket_std_dev.to_bits(),
        result.point_estimates.distribution_mean.to_bits(),
    ];
    if let Some(buckets) = &result.buckets {
        bits.extend(buckets.bands.iter().map(|b| b.probability.to_bits()));
    }
    if let Some(p) = result.recommendation.primary_probability {
        bits.push(p.to_bits());
    }
    bits
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn saved_forecasts_read_back_bit_for_bit(
        minutes in proptest::collection::vec(1i64..2_879, 1..6),
        counts in proptest::collection::vec(0u64..600, 6),
    ) {
        let dir = TempDir::new().unwrap();
        let data = DataDir::new(dir.path());
        let engine = ForecastEngine::new(&ForecastConfig::builtin()).with_config_hash("cafebabe");
        let start = at("2026-02-05T12:00:00-05:00");

        let mut history = ForecastHistory::open(data.history_path()).unwrap();
        let mut minutes = minutes;
        minutes.sort_unstable();
        for (m, count) in minutes.iter().zip(&counts) {
            let now = start + Duration::minutes(*m);
            let outcome = engine
                .forecast_at(*count, now, history.entries(), &RunId::new())
                .unwrap();
            let result = outcome.result().cloned().expect("inside the window");
            history.append(result).unwrap();
        }

        let reopened = ForecastHistory::open(data.history_path()).unwrap();
        prop_assert_eq!(reopened.len(), history.len());
        for (saved, read) in history.entries().iter().zip(reopened.entries()) {
            prop_assert_eq!(float_bits(saved), float_bits(read));
            prop_assert_eq!(saved, read);
        }
    }
}
