//! One forecast run, end to end.
//!
//! [`ForecastEngine`] owns one instance of each component, all built from the
//! same immutable [`ForecastConfig`]. A run takes already-resolved inputs
//! (count, time, prior results) and returns a self-contained
//! [`ForecastOutcome`]; persistence is the caller's business.

use chrono::{DateTime, Utc};
use tally_common::{Error, Result, RunId};
use tally_config::{ForecastConfig, WindowConfig};

use crate::allocate::{AllocationReport, SnapshotAllocator};
use crate::buckets::BucketMapper;
use crate::forecast::{ForecastInput, Projection, RateForecaster};
use crate::logging::{event_names, LogContext, Stage};
use crate::model::Snapshot;
use crate::recommend::RecommendationEngine;
use crate::result::{ForecastOutcome, ForecastResult};
use crate::trend::{TrendAnalyzer, TrendReport};

#[derive(Debug, Clone)]
pub struct ForecastEngine {
    window: WindowConfig,
    model_name: &'static str,
    allocator: SnapshotAllocator,
    forecaster: RateForecaster,
    mapper: BucketMapper,
    analyzer: TrendAnalyzer,
    recommender: RecommendationEngine,
    config_hash: Option<String>,
}

impl ForecastEngine {
    pub fn new(config: &ForecastConfig) -> Self {
        ForecastEngine {
            window: config.window,
            model_name: config.model.name(),
            allocator: SnapshotAllocator::from_config(config),
            forecaster: RateForecaster::from_config(config),
            mapper: BucketMapper::from_config(config),
            analyzer: TrendAnalyzer::new(),
            recommender: RecommendationEngine::from_config(config),
            config_hash: None,
        }
    }

    /// Stamp every result with the hash of the configuration that produced it.
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn window(&self) -> &WindowConfig {
        &self.window
    }

    pub fn allocator(&self) -> &SnapshotAllocator {
        &self.allocator
    }

    pub fn forecaster(&self) -> &RateForecaster {
        &self.forecaster
    }

    pub fn mapper(&self) -> &BucketMapper {
        &self.mapper
    }

    /// Spread the snapshot feed over reference-zone days.
    pub fn allocate(&self, snapshots: &[Snapshot]) -> AllocationReport {
        self.allocator.allocate(snapshots)
    }

    /// Forecast for `count` observed at `now`.
    pub fn forecast_at(
        &self,
        count: u64,
        now: DateTime<Utc>,
        history: &[ForecastResult],
        run_id: &RunId,
    ) -> Result<ForecastOutcome> {
        let input = ForecastInput::at(&self.window, count, now);
        self.run(&input, now, history, run_id)
    }

    /// Run forecaster, mapper, trend and recommendation over `input`.
    ///
    /// `history` holds earlier results, oldest first; the trend never
    /// includes the result being built. A degenerate bucket distribution
    /// leaves `buckets` empty rather than failing the run.
    pub fn run(
        &self,
        input: &ForecastInput,
        timestamp: DateTime<Utc>,
        history: &[ForecastResult],
        run_id: &RunId,
    ) -> Result<ForecastOutcome> {
        let ctx = LogContext::new(run_id.as_str()).with_config_hash(self.config_hash.clone());

        let forecast = {
            let _stage = ctx.stage(Stage::Forecast).entered();
            match self.forecaster.project(input)? {
                Projection::Closed(closed) => {
                    crate::log_event!(
                        ctx,
                        INFO,
                        event_names::FORECAST_WINDOW_CLOSED,
                        Stage::Forecast,
                        "window closed, count is final",
                        final_count = closed.final_count
                    );
                    return Ok(ForecastOutcome::Closed(closed));
                }
                Projection::Open(forecast) => {
                    crate::log_event!(
                        ctx,
                        DEBUG,
                        event_names::FORECAST_COMPUTED,
                        Stage::Forecast,
                        "forecast computed",
                        progress_pct = forecast.progress_pct,
                        lambda_combined = forecast.lambda_combined,
                        expected_total = forecast.expected_total
                    );
                    forecast
                }
            }
        };

        let bucket_std_dev = self.mapper.std_dev_for(&forecast);
        let buckets = {
            let _stage = ctx.stage(Stage::Buckets).entered();
            match self.mapper.map(forecast.expected_total, bucket_std_dev) {
                Ok(buckets) => {
                    let most_likely = buckets
                        .most_likely()
                        .map(|b| b.label.clone())
                        .unwrap_or_default();
                    crate::log_event!(
                        ctx,
                        DEBUG,
                        event_names::BUCKETS_MAPPED,
                        Stage::Buckets,
                        "band probabilities mapped",
                        std_dev = bucket_std_dev,
                        most_likely = most_likely.as_str()
                    );
                    Some(buckets)
                }
                Err(Error::DegenerateDistribution { mean, std_dev }) => {
                    crate::log_event!(
                        ctx,
                        WARN,
                        event_names::BUCKETS_DEGENERATE,
                        Stage::Buckets,
                        "no band received probability mass, reporting point estimate only",
                        mean = mean,
                        std_dev = std_dev
                    );
                    None
                }
                Err(err) => return Err(err),
            }
        };

        let trend = {
            let _stage = ctx.stage(Stage::Trend).entered();
            let trend = self.analyzer.analyze(history);
            match &trend {
                TrendReport::Insufficient { samples } => crate::log_event!(
                    ctx,
                    DEBUG,
                    event_names::TREND_INSUFFICIENT,
                    Stage::Trend,
                    "not enough history for a trend",
                    samples = *samples
                ),
                TrendReport::Trend(stats) => {
                    let direction = stats.direction.to_string();
                    crate::log_event!(
                        ctx,
                        DEBUG,
                        event_names::TREND_COMPUTED,
                        Stage::Trend,
                        "trend computed",
                        slope = stats.slope,
                        direction = direction.as_str()
                    )
                }
            }
            trend
        };

        let recommendation = {
            let _stage = ctx.stage(Stage::Recommend).entered();
            let recommendation =
                self.recommender
                    .recommend(&forecast, buckets.as_ref(), &trend)?;
            let confidence = recommendation.confidence.to_string();
            crate::log_event!(
                ctx,
                INFO,
                event_names::RECOMMEND_ISSUED,
                Stage::Recommend,
                "recommendation issued",
                primary = recommendation.primary.as_str(),
                confidence = confidence.as_str()
            );
            recommendation
        };

        let mut result = ForecastResult::assemble(
            run_id.as_str().to_string(),
            timestamp,
            &forecast,
            self.model_name,
            bucket_std_dev,
            buckets,
            trend,
            recommendation,
        );
        result.config_hash = self.config_hash.clone();
        Ok(ForecastOutcome::Open(Box::new(result)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::JsonlLayer;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tally_config::BucketSpread;
    use tracing_subscriber::layer::SubscriberExt;

    fn at(ts: &str) -> DateTime<Utc> {
        ts.parse().unwrap()
    }

    fn engine() -> ForecastEngine {
        ForecastEngine::new(&ForecastConfig::builtin())
    }

    fn open(outcome: ForecastOutcome) -> ForecastResult {
        match outcome {
            ForecastOutcome::Open(result) => *result,
            other => panic!("expected open window, got {other:?}"),
        }
    }

    #[test]
    fn midpoint_run_produces_full_result() {
        let run_id = RunId::new();
        let now = at("2026-02-06T12:00:00-05:00");
        let result = open(engine().forecast_at(100, now, &[], &run_id).unwrap());

        assert_eq!(result.run_id, run_id.as_str());
        assert_eq!(result.progress_pct, 50.0);
        assert_eq!(result.blend_weight, 1.0);
        assert_eq!(result.point_estimates.linear, 200);
        assert_eq!(result.point_estimates.conservative, 190);
        assert_eq!(result.model, "poisson");
        assert_eq!(result.bucket_std_dev, 50.0);
        assert!(result.buckets.is_some());
        assert_eq!(result.recommendation.primary, "190-214");
        assert_eq!(result.trend, TrendReport::Insufficient { samples: 0 });
        assert!(result.config_hash.is_none());
    }

    #[test]
    fn closed_window_reports_final_count() {
        let now = at("2026-02-07T13:00:00-05:00");
        let outcome = engine().forecast_at(321, now, &[], &RunId::new()).unwrap();
        let ForecastOutcome::Closed(closed) = outcome else {
            panic!("expected closed window");
        };
        assert_eq!(closed.final_count, 321);
        assert!(closed.remaining_hours < 0.0);
    }

    #[test]
    fn reading_before_window_is_invalid() {
        let now = at("2026-02-05T11:00:00-05:00");
        let err = engine().forecast_at(0, now, &[], &RunId::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
    }

    #[test]
    fn empty_window_is_invalid() {
        let input = ForecastInput::new(0, 0.0, 0.0);
        let err = engine().run(&input, Utc::now(), &[], &RunId::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
    }

    #[test]
    fn degenerate_buckets_keep_point_estimate() {
        let mut config = ForecastConfig::builtin();
        config.bucket_spread = BucketSpread::Fixed { std_dev: 0.0 };
        let engine = ForecastEngine::new(&config);
        // 38 · 27/26 ≈ 39.46 sits between the <40 and 40-64 edges
        let input = ForecastInput::new(38, 26.0, 1.0);
        let result = open(engine.run(&input, Utc::now(), &[], &RunId::new()).unwrap());

        assert!(result.buckets.is_none());
        assert_eq!(result.point_estimates.conservative, 39);
        assert_eq!(result.recommendation.primary, "<40");
        assert!(result.recommendation.primary_probability.is_none());
    }

    #[test]
    fn trend_uses_prior_results() {
        let engine = engine();
        let mut history = Vec::new();
        for (i, hour) in ["14", "16", "18"].iter().enumerate() {
            let now = at(&format!("2026-02-06T{hour}:00:00-05:00"));
            let result = open(
                engine
                    .forecast_at(100 + 10 * i as u64, now, &history, &RunId::new())
                    .unwrap(),
            );
            history.push(result);
        }
        assert_eq!(history[0].trend, TrendReport::Insufficient { samples: 0 });
        assert_eq!(history[1].trend, TrendReport::Insufficient { samples: 1 });
        assert!(history[2].trend.stats().is_some());
    }

    #[test]
    fn config_hash_is_stamped() {
        let engine = engine().with_config_hash("abc123");
        let now = at("2026-02-06T00:00:00-05:00");
        let result = open(engine.forecast_at(50, now, &[], &RunId::new()).unwrap());
        assert_eq!(result.config_hash.as_deref(), Some("abc123"));
    }

    #[derive(Clone, Default)]
    struct Lines(Arc<Mutex<Vec<u8>>>);

    impl Write for Lines {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn every_stage_logs_under_the_run() {
        let buf = Lines::default();
        let subscriber = tracing_subscriber::registry().with(JsonlLayer::new(buf.clone()));
        let run_id = RunId::new();
        let engine = engine().with_config_hash("abc123");
        tracing::subscriber::with_default(subscriber, || {
            let now = at("2026-02-06T12:00:00-05:00");
            engine.forecast_at(100, now, &[], &run_id).unwrap();
        });

        let bytes = buf.0.lock().unwrap();
        let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&bytes)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        let events: Vec<&str> = lines.iter().filter_map(|l| l["event"].as_str()).collect();
        assert_eq!(
            events,
            [
                event_names::FORECAST_COMPUTED,
                event_names::BUCKETS_MAPPED,
                event_names::TREND_INSUFFICIENT,
                event_names::RECOMMEND_ISSUED,
            ]
        );
        let stages: Vec<&str> = lines.iter().filter_map(|l| l["stage"].as_str()).collect();
        assert_eq!(stages, ["forecast", "buckets", "trend", "recommend"]);
        for line in &lines {
            assert_eq!(line["run_id"], run_id.as_str());
            assert_eq!(line["config_hash"], "abc123");
        }
        let recommend = lines.last().unwrap();
        assert_eq!(recommend["fields"]["primary"], "190-214");
    }
}
