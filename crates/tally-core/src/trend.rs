//! Short-term trend of recent forecasts.
//!
//! The sample is the conservative estimate of the most recent forecasts. An
//! OLS slope over their index gives the direction and the coefficient of
//! variation gives the volatility. Cutoffs are fixed.

use serde::{Deserialize, Serialize};
use tally_math::stats;

use crate::result::ForecastResult;

/// Number of most recent forecasts considered.
pub const TREND_WINDOW: usize = 5;

/// Fewer samples than this yield [`TrendReport::Insufficient`].
pub const MIN_TREND_SAMPLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    StrongUp,
    Up,
    Stable,
    Down,
    StrongDown,
}

impl TrendDirection {
    /// Classify an OLS slope (units per forecast). All cutoffs are strict.
    pub fn from_slope(slope: f64) -> Self {
        if slope > 2.0 {
            TrendDirection::StrongUp
        } else if slope > 0.5 {
            TrendDirection::Up
        } else if slope > -0.5 {
            TrendDirection::Stable
        } else if slope > -2.0 {
            TrendDirection::Down
        } else {
            TrendDirection::StrongDown
        }
    }

    pub fn is_up(self) -> bool {
        matches!(self, TrendDirection::StrongUp | TrendDirection::Up)
    }

    pub fn is_down(self) -> bool {
        matches!(self, TrendDirection::StrongDown | TrendDirection::Down)
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::StrongUp => "strong up",
            TrendDirection::Up => "up",
            TrendDirection::Stable => "stable",
            TrendDirection::Down => "down",
            TrendDirection::StrongDown => "strong down",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    VeryStable,
    Stable,
    Moderate,
    High,
}

impl Volatility {
    /// Classify a coefficient of variation in percent.
    pub fn from_cv(cv_pct: f64) -> Self {
        if cv_pct < 5.0 {
            Volatility::VeryStable
        } else if cv_pct < 10.0 {
            Volatility::Stable
        } else if cv_pct < 20.0 {
            Volatility::Moderate
        } else {
            Volatility::High
        }
    }
}

impl std::fmt::Display for Volatility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Volatility::VeryStable => "very stable",
            Volatility::Stable => "stable",
            Volatility::Moderate => "moderate",
            Volatility::High => "high",
        };
        f.write_str(s)
    }
}

/// Trend over the sampled forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStats {
    /// Sampled values, oldest first.
    pub values: Vec<u64>,
    pub slope: f64,
    pub direction: TrendDirection,
    pub mean: f64,
    pub cv_pct: f64,
    pub volatility: Volatility,
}

impl TrendStats {
    /// Flat direction and low volatility.
    pub fn is_stable(&self) -> bool {
        self.direction == TrendDirection::Stable
            && matches!(self.volatility, Volatility::VeryStable | Volatility::Stable)
    }
}

/// Trend classification; too little history is a result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrendReport {
    Insufficient { samples: usize },
    Trend(TrendStats),
}

impl TrendReport {
    pub fn stats(&self) -> Option<&TrendStats> {
        match self {
            TrendReport::Trend(stats) => Some(stats),
            TrendReport::Insufficient { .. } => None,
        }
    }

    pub fn direction(&self) -> Option<TrendDirection> {
        self.stats().map(|s| s.direction)
    }

    pub fn is_stable(&self) -> bool {
        self.stats().is_some_and(TrendStats::is_stable)
    }
}

/// Computes [`TrendReport`]s from forecast history.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        TrendAnalyzer
    }

    /// Trend over the last [`TREND_WINDOW`] results (ordered oldest first).
    pub fn analyze(&self, history: &[ForecastResult]) -> TrendReport {
        let values: Vec<u64> = history
            .iter()
            .map(|r| r.point_estimates.conservative)
            .collect();
        self.analyze_values(&values)
    }

    /// Trend over the last [`TREND_WINDOW`] of `values` (oldest first).
    pub fn analyze_values(&self, values: &[u64]) -> TrendReport {
        if values.len() < MIN_TREND_SAMPLES {
            return TrendReport::Insufficient {
                samples: values.len(),
            };
        }

        let recent = &values[values.len().saturating_sub(TREND_WINDOW)..];
        let ys: Vec<f64> = recent.iter().map(|&v| v as f64).collect();
        let slope = stats::ols_slope(&ys);
        let mean = stats::mean(&ys).unwrap_or(0.0);
        let cv_pct = stats::coefficient_of_variation_pct(&ys).unwrap_or(0.0);

        TrendReport::Trend(TrendStats {
            values: recent.to_vec(),
            slope,
            direction: TrendDirection::from_slope(slope),
            mean,
            cv_pct,
            volatility: Volatility::from_cv(cv_pct),
        })
    }
}
