//! Rate-blending forecaster.
//!
//! Early in the window the observed rate is noisy, so the forecaster leans
//! on a prior rate and shifts weight linearly to the observed rate until half
//! the window has elapsed. The blended rate over the remaining hours is the
//! mean of a Poisson or negative-binomial count for the rest of the window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_common::{Error, Result};
use tally_config::{ForecastConfig, ModelConfig, WindowConfig};
use tally_math::CountDistribution;

use crate::calendar::ReferenceZone;

/// Haircut applied to the projected remainder in the conservative estimate.
pub const CONSERVATIVE_FACTOR: f64 = 0.9;

/// Progress (percent) at which the observed rate gets full weight.
pub const FULL_TRUST_PROGRESS_PCT: f64 = 50.0;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Where the window stands at forecast time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub current_count: u64,
    pub elapsed_hours: f64,
    /// Negative once the window has closed.
    pub remaining_hours: f64,
}

impl ForecastInput {
    pub fn new(current_count: u64, elapsed_hours: f64, remaining_hours: f64) -> Self {
        ForecastInput {
            current_count,
            elapsed_hours,
            remaining_hours,
        }
    }

    /// Position of `now` relative to `window`.
    pub fn at(window: &WindowConfig, current_count: u64, now: DateTime<Utc>) -> Self {
        let hours = |from: DateTime<Utc>, to: DateTime<Utc>| {
            (to - from).num_milliseconds() as f64 / MS_PER_HOUR
        };
        ForecastInput {
            current_count,
            elapsed_hours: hours(window.start, now),
            remaining_hours: hours(now, window.end),
        }
    }

    pub fn total_hours(&self) -> f64 {
        self.elapsed_hours + self.remaining_hours
    }
}

/// An inclusive range of final counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountInterval {
    pub lower: u64,
    pub upper: u64,
}

impl CountInterval {
    pub fn width(&self) -> u64 {
        self.upper - self.lower
    }
}

/// Rate forecast for an open window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateForecast {
    pub current_count: u64,
    pub elapsed_hours: f64,
    pub remaining_hours: f64,
    pub total_hours: f64,
    pub progress_pct: f64,

    pub lambda_observed: f64,
    pub lambda_prior: f64,
    /// Weight on the observed rate, `min(1, progress / 50)`.
    pub blend_weight: f64,
    pub lambda_combined: f64,
    /// Expected events in the remaining hours.
    pub lambda_future: f64,

    pub distribution: CountDistribution,
    /// `current_count` plus the distribution mean.
    pub expected_total: f64,
    pub std_dev: f64,
    /// `current_count + [P10, P90]`.
    pub interval_80: CountInterval,
    /// `current_count + [P5, P95]`.
    pub interval_90: CountInterval,

    /// Observed rate extrapolated over the whole window.
    pub predicted_linear: u64,
    pub predicted_conservative: u64,
    /// Conservative estimate with the weekend boost applied.
    pub predicted_weekend: u64,
    pub weekend_hours: u32,
    /// Observed rate per 24 hours.
    pub daily_rate: f64,
}

/// The window closed before this reading; the count is final.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosedWindow {
    pub final_count: u64,
    pub elapsed_hours: f64,
    pub remaining_hours: f64,
}

/// Forecaster output: a distribution while open, the observed count once closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Closed(ClosedWindow),
    Open(RateForecast),
}

/// Blends observed and prior rates into a count distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RateForecaster {
    lambda_prior: f64,
    model: ModelConfig,
    weekend_boost: f64,
    weekend_hours: u32,
}

impl RateForecaster {
    pub fn new(lambda_prior: f64, model: ModelConfig) -> Self {
        RateForecaster {
            lambda_prior,
            model,
            weekend_boost: 1.0,
            weekend_hours: 0,
        }
    }

    /// Enable the weekend variant for a window containing `hours` weekend hours.
    pub fn with_weekend(mut self, boost: f64, hours: u32) -> Self {
        self.weekend_boost = boost;
        self.weekend_hours = hours;
        self
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        let zone = ReferenceZone::from_config(config);
        let weekend_hours =
            zone.weekend_hours(config.window.start, config.window.end, &config.weekend);
        RateForecaster::new(config.lambda_prior, config.model)
            .with_weekend(config.weekend.boost, weekend_hours)
    }

    pub fn lambda_prior(&self) -> f64 {
        self.lambda_prior
    }

    pub fn model(&self) -> ModelConfig {
        self.model
    }

    /// Project the final count.
    ///
    /// Fails with `InvalidWindow` when `elapsed_hours < 0` or the total
    /// window length is not positive. A negative `remaining_hours` returns
    /// [`Projection::Closed`] with the current count as final.
    pub fn project(&self, input: &ForecastInput) -> Result<Projection> {
        let elapsed = input.elapsed_hours;
        let remaining = input.remaining_hours;
        let total = input.total_hours();

        if !elapsed.is_finite() || !remaining.is_finite() || elapsed < 0.0 || total <= 0.0 {
            return Err(Error::InvalidWindow {
                elapsed_hours: elapsed,
                total_hours: total,
            });
        }
        if remaining < 0.0 {
            return Ok(Projection::Closed(ClosedWindow {
                final_count: input.current_count,
                elapsed_hours: elapsed,
                remaining_hours: remaining,
            }));
        }

        let count = input.current_count as f64;
        let lambda_observed = if elapsed > 0.0 { count / elapsed } else { 0.0 };
        // count · hours / elapsed: same value as λ_obs · hours, without the
        // intermediate rounding of λ_obs
        let observed_over = |hours: f64| {
            if elapsed > 0.0 {
                count * hours / elapsed
            } else {
                0.0
            }
        };

        let progress_pct = 100.0 * elapsed / total;
        let blend_weight = (progress_pct / FULL_TRUST_PROGRESS_PCT).min(1.0);
        let lambda_combined =
            blend_weight * lambda_observed + (1.0 - blend_weight) * self.lambda_prior;
        let lambda_future = (lambda_combined * remaining).max(0.0);

        let distribution = CountDistribution::new(lambda_future, self.model.alpha());
        let pct = distribution.percentiles();
        let current = input.current_count;

        let conservative_remainder = observed_over(remaining) * CONSERVATIVE_FACTOR;
        let predicted_conservative = (count + conservative_remainder).floor() as u64;
        let predicted_weekend = if self.weekend_hours > 0 {
            (count + conservative_remainder * self.weekend_boost).floor() as u64
        } else {
            predicted_conservative
        };

        Ok(Projection::Open(RateForecast {
            current_count: current,
            elapsed_hours: elapsed,
            remaining_hours: remaining,
            total_hours: total,
            progress_pct,
            lambda_observed,
            lambda_prior: self.lambda_prior,
            blend_weight,
            lambda_combined,
            lambda_future,
            expected_total: count + distribution.mean(),
            std_dev: distribution.std_dev(),
            distribution,
            interval_80: CountInterval {
                lower: current + pct.p10,
                upper: current + pct.p90,
            },
            interval_90: CountInterval {
                lower: current + pct.p5,
                upper: current + pct.p95,
            },
            predicted_linear: observed_over(total).floor() as u64,
            predicted_conservative,
            predicted_weekend,
            weekend_hours: self.weekend_hours,
            daily_rate: lambda_observed * 24.0,
        }))
    }
}
