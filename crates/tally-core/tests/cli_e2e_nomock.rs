//! End-to-end tests for the `tally` binary.
//!
//! Each test gets its own data directory and an explicit config file so the
//! host environment cannot leak in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tally_config::ForecastConfig;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = dir.path().join("tally.json");
        let json = serde_json::to_string_pretty(&ForecastConfig::builtin()).unwrap();
        std::fs::write(&config, json).unwrap();
        Workspace { dir, config }
    }

    fn data(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn tally(&self) -> Command {
        let mut cmd = Command::cargo_bin("tally").expect("tally binary should exist");
        cmd.env_remove("TALLY_LOG")
            .env_remove("TALLY_LOG_FORMAT")
            .env_remove("RUST_LOG")
            .env_remove("TALLY_DATA")
            .arg("--config")
            .arg(&self.config)
            .arg("--data-dir")
            .arg(self.data());
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.tally().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "tally {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is JSON")
    }
}

fn lines(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

// ============================================================================
// forecast
// ============================================================================

mod forecast {
    use super::*;

    #[test]
    fn midpoint_forecast_is_saved() {
        let ws = Workspace::new();
        let out = ws.json(&[
            "forecast",
            "--count",
            "100",
            "--at",
            "2026-02-06T12:00:00-05:00",
        ]);

        assert_eq!(out["forecast"]["status"], "open");
        assert_eq!(out["forecast"]["point_estimates"]["conservative"], 190);
        assert_eq!(out["forecast"]["point_estimates"]["linear"], 200);
        assert_eq!(out["forecast"]["recommendation"]["primary"], "190-214");
        assert_eq!(out["forecast"]["trend"]["status"], "insufficient");
        assert_eq!(out["saved"], true);
        assert!(out["forecast"]["config_hash"].is_string());
        assert_eq!(lines(&ws.data().join("forecasts.jsonl")), 1);
    }

    #[test]
    fn no_save_leaves_history_untouched() {
        let ws = Workspace::new();
        ws.tally()
            .args(["forecast", "--count", "100", "--at", "2026-02-06T12:00:00-05:00"])
            .arg("--no-save")
            .assert()
            .success();
        assert_eq!(lines(&ws.data().join("forecasts.jsonl")), 0);
    }

    #[test]
    fn closed_window_exits_one() {
        let ws = Workspace::new();
        ws.tally()
            .args(["forecast", "--count", "250", "--at", "2026-02-08T00:00:00-05:00"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("\"closed\""))
            .stdout(predicate::str::contains("\"final_count\": 250"));
        assert_eq!(lines(&ws.data().join("forecasts.jsonl")), 0);
    }

    #[test]
    fn reading_before_window_is_input_error() {
        let ws = Workspace::new();
        let output = ws
            .tally()
            .args(["forecast", "--count", "5", "--at", "2026-02-05T06:00:00-05:00"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(12));
        let err: Value = serde_json::from_slice(&output.stderr)
            .ok()
            .or_else(|| {
                // The JSON error is the last stderr line
                let stderr = String::from_utf8_lossy(&output.stderr);
                stderr.lines().last().and_then(|l| serde_json::from_str(l).ok())
            })
            .expect("structured error on stderr");
        assert_eq!(err["code"], 30);
        assert_eq!(err["category"], "forecast");
    }

    #[test]
    fn summary_is_one_line() {
        let ws = Workspace::new();
        ws.tally()
            .args(["forecast", "--count", "100", "--at", "2026-02-06T12:00:00-05:00"])
            .args(["--format", "summary"])
            .assert()
            .success()
            .stdout(predicate::str::contains("190-214"))
            .stdout(predicate::str::is_match("^[^\n]+\n$").unwrap());
    }

    #[test]
    fn markdown_has_sections() {
        let ws = Workspace::new();
        ws.tally()
            .args(["forecast", "--count", "100", "--at", "2026-02-06T12:00:00-05:00"])
            .args(["-f", "md"])
            .assert()
            .success()
            .stdout(predicate::str::contains("# tally forecast"))
            .stdout(predicate::str::contains("## Recommendation"));
    }

    #[test]
    fn history_and_trend_follow_saved_forecasts() {
        let ws = Workspace::new();
        for (count, hour) in [(100, "12"), (100, "13"), (100, "14")] {
            ws.json(&[
                "forecast",
                "--count",
                &count.to_string(),
                "--at",
                &format!("2026-02-06T{hour}:00:00-05:00"),
            ]);
        }

        let history = ws.json(&["history", "--limit", "2"]);
        assert_eq!(history["total"], 3);
        assert_eq!(history["forecasts"].as_array().unwrap().len(), 2);

        let trend = ws.json(&["trend"]);
        assert_eq!(trend["forecasts"], 3);
        assert_eq!(trend["trend"]["status"], "trend");
        assert_eq!(trend["trend"]["values"].as_array().unwrap().len(), 3);
    }
}

// ============================================================================
// record / allocate / capture / daily
// ============================================================================

mod record {
    use super::*;

    #[test]
    fn readings_allocate_into_daily_counts() {
        let ws = Workspace::new();
        ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:00:00-05:00"]);
        let out = ws.json(&["record", "--count", "148", "--at", "2026-02-06T12:00:00-05:00"]);
        assert_eq!(out["recorded"]["outcome"], "appended");
        assert_eq!(out["allocation"]["increments"]["2026-02-05"], 24);
        assert_eq!(out["allocation"]["increments"]["2026-02-06"], 24);

        let daily = ws.json(&["daily"]);
        let records = daily["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["count"], 24);
        assert_eq!(records[0]["is_calculated"], true);
        assert_eq!(daily["summary"]["total"], 48);
        assert_eq!(daily["momentum"]["status"], "insufficient");
    }

    #[test]
    fn unchanged_count_is_not_stored() {
        let ws = Workspace::new();
        ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:00:00-05:00"]);
        let out = ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:05:00-05:00"]);
        assert_eq!(out["recorded"]["outcome"], "unchanged");
        assert_eq!(lines(&ws.data().join("snapshots.jsonl")), 1);
    }

    #[test]
    fn regression_exits_two_and_keeps_the_rest() {
        let ws = Workspace::new();
        ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:00:00-05:00"]);
        ws.json(&["record", "--count", "130", "--at", "2026-02-05T15:00:00-05:00"]);
        ws.tally()
            .args(["record", "--count", "120", "--at", "2026-02-05T18:00:00-05:00"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("counter_regression"));

        let daily = ws.json(&["daily"]);
        assert_eq!(daily["records"][0]["count"], 30);
    }

    #[test]
    fn captured_day_survives_allocation() {
        let ws = Workspace::new();
        ws.json(&["capture", "--date", "2026-02-05", "--count", "50", "--source", "report"]);
        ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:00:00-05:00"]);
        let out = ws.json(&["record", "--count", "148", "--at", "2026-02-06T12:00:00-05:00"]);
        assert_eq!(
            out["merge"]["outcomes"]["2026-02-05"]["outcome"],
            "preserved_captured"
        );

        let daily = ws.json(&["daily"]);
        assert_eq!(daily["records"][0]["count"], 50);
        assert_eq!(daily["records"][0]["is_calculated"], false);

        let out = ws.json(&["allocate", "--overwrite-captured"]);
        assert_eq!(
            out["merge"]["outcomes"]["2026-02-05"]["outcome"],
            "overwrote_captured"
        );
        let daily = ws.json(&["daily"]);
        assert_eq!(daily["records"][0]["count"], 24);
    }
}

// ============================================================================
// config and argument errors
// ============================================================================

mod errors {
    use super::*;

    #[test]
    fn config_validate_accepts_builtin_file() {
        let ws = Workspace::new();
        let out = ws.json(&["config", "validate"]);
        assert_eq!(out["status"], "valid");
    }

    #[test]
    fn invalid_config_exits_eleven() {
        let ws = Workspace::new();
        let bad = ws.dir.path().join("bad.json");
        let mut config = serde_json::to_value(ForecastConfig::builtin()).unwrap();
        config["lambda_prior"] = serde_json::json!(-1.0);
        std::fs::write(&bad, config.to_string()).unwrap();

        ws.tally()
            .args(["config", "validate"])
            .arg(&bad)
            .assert()
            .code(11);
    }

    #[test]
    fn missing_config_file_exits_eleven() {
        let ws = Workspace::new();
        let tally = || {
            let mut cmd = Command::cargo_bin("tally").unwrap();
            cmd.env_remove("TALLY_DATA")
                .args(["--config", "/nonexistent/tally.json", "--data-dir"])
                .arg(ws.data());
            cmd
        };
        // Commands that never read the config are unaffected
        tally().arg("trend").assert().success();
        tally()
            .args(["forecast", "--count", "1"])
            .assert()
            .code(11);
    }

    #[test]
    fn bad_timestamp_is_args_error() {
        let ws = Workspace::new();
        ws.tally()
            .args(["forecast", "--count", "1", "--at", "yesterday"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("RFC 3339"));
    }

    #[test]
    fn unknown_command_is_args_error() {
        let ws = Workspace::new();
        ws.tally()
            .arg("nonexistent-command")
            .assert()
            .code(10)
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn help_exits_clean() {
        Command::cargo_bin("tally")
            .unwrap()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("forecast"));
    }
}

// ============================================================================
// logging
// ============================================================================

mod logging {
    use super::*;

    fn stderr_lines(output: &std::process::Output) -> Vec<Value> {
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap_or_else(|_| panic!("not JSON: {l}")))
            .collect()
    }

    #[test]
    fn jsonl_from_env_tags_every_stage_with_the_run() {
        let ws = Workspace::new();
        let output = ws
            .tally()
            .env("TALLY_LOG_FORMAT", "jsonl")
            .args(["-vv", "forecast", "--count", "100"])
            .args(["--at", "2026-02-06T12:00:00-05:00"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let payload: Value = serde_json::from_slice(&output.stdout).unwrap();
        let lines = stderr_lines(&output);

        let stages: Vec<&str> = lines.iter().filter_map(|l| l["stage"].as_str()).collect();
        for stage in ["init", "forecast", "buckets", "trend", "recommend", "persist"] {
            assert!(stages.contains(&stage), "no {stage} line in {stages:?}");
        }
        assert!(lines.iter().all(|l| l["run_id"] == payload["run_id"]));
        let issued = lines
            .iter()
            .find(|l| l["event"] == "recommend.issued")
            .expect("recommendation logged");
        assert_eq!(issued["fields"]["primary"], "190-214");
        assert_eq!(issued["config_hash"], payload["forecast"]["config_hash"]);
    }

    #[test]
    fn allocator_warnings_carry_the_allocate_stage() {
        let ws = Workspace::new();
        ws.json(&["record", "--count", "100", "--at", "2026-02-05T12:00:00-05:00"]);
        let output = ws
            .tally()
            .args(["--log-format", "jsonl"])
            .args(["record", "--count", "90", "--at", "2026-02-05T14:00:00-05:00"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2));
        let lines = stderr_lines(&output);
        assert!(!lines.is_empty());
        assert!(lines
            .iter()
            .all(|l| l["level"] == "warn" && l["stage"] == "allocate"));
        assert!(lines.iter().any(|l| l["event"] == "allocate.regression"));
    }

    #[test]
    fn unknown_log_format_is_args_error() {
        let ws = Workspace::new();
        ws.tally()
            .args(["--log-format", "xml", "trend"])
            .assert()
            .code(10)
            .stderr(predicate::str::contains("jsonl"));
    }
}
