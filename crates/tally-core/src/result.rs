//! The self-contained record produced by each forecast run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::buckets::BucketDistribution;
use crate::forecast::{ClosedWindow, CountInterval, RateForecast};
use crate::recommend::Recommendation;
use crate::trend::TrendReport;

/// Point estimates of the final count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointEstimates {
    pub linear: u64,
    pub conservative: u64,
    pub weekend: u64,
    pub distribution_mean: f64,
}

/// One forecast run. Appended to history, never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub current_count: u64,
    pub elapsed_hours: f64,
    pub remaining_hours: f64,
    pub progress_pct: f64,
    pub point_estimates: PointEstimates,
    pub interval_80: CountInterval,
    pub interval_90: CountInterval,
    /// `None` when the bucket distribution was degenerate.
    pub buckets: Option<BucketDistribution>,
    pub recommendation: Recommendation,
    pub trend: TrendReport,

    pub lambda_observed: f64,
    pub lambda_prior: f64,
    pub lambda_combined: f64,
    pub blend_weight: f64,
    pub daily_rate: f64,
    pub weekend_hours: u32,
    /// Count model name (`poisson` or `neg_binom`).
    pub model: String,
    /// Spread used for the bucket mapping.
    pub bucket_std_dev: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl ForecastResult {
    /// Assemble a result from its parts.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        run_id: String,
        timestamp: DateTime<Utc>,
        forecast: &RateForecast,
        model: &str,
        bucket_std_dev: f64,
        buckets: Option<BucketDistribution>,
        trend: TrendReport,
        recommendation: Recommendation,
    ) -> Self {
        ForecastResult {
            run_id,
            timestamp,
            current_count: forecast.current_count,
            elapsed_hours: forecast.elapsed_hours,
            remaining_hours: forecast.remaining_hours,
            progress_pct: forecast.progress_pct,
            point_estimates: PointEstimates {
                linear: forecast.predicted_linear,
                conservative: forecast.predicted_conservative,
                weekend: forecast.predicted_weekend,
                distribution_mean: forecast.expected_total,
            },
            interval_80: forecast.interval_80,
            interval_90: forecast.interval_90,
            buckets,
            recommendation,
            trend,
            lambda_observed: forecast.lambda_observed,
            lambda_prior: forecast.lambda_prior,
            lambda_combined: forecast.lambda_combined,
            blend_weight: forecast.blend_weight,
            daily_rate: forecast.daily_rate,
            weekend_hours: forecast.weekend_hours,
            model: model.to_string(),
            bucket_std_dev,
            config_hash: None,
        }
    }
}

/// Outcome of a forecast run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastOutcome {
    Closed(ClosedWindow),
    Open(Box<ForecastResult>),
}

impl ForecastOutcome {
    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            ForecastOutcome::Open(result) => Some(result),
            ForecastOutcome::Closed(_) => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ForecastOutcome::Closed(_))
    }
}
