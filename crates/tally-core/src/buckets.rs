//! Band probabilities from a normal approximation of the forecast.
//!
//! Band edges are inclusive integers and do not line up with the support of
//! the count model, so each band's mass is `Φ((upper − μ)/σ) − Φ((lower − μ)/σ)`
//! and the open final band takes `1 − Φ((lower − μ)/σ)`. Masses are floored
//! at zero and normalized to sum to one.

use serde::{Deserialize, Serialize};
use tally_common::{Error, Result};
use tally_config::{Band, BucketSpread, ForecastConfig};
use tally_math::normal_interval;

use crate::forecast::RateForecast;

/// Probability assigned to one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandProbability {
    pub label: String,
    pub lower: u64,
    pub upper: Option<u64>,
    pub probability: f64,
}

/// Normalized band probabilities, in the order the bands were supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDistribution {
    pub mean: f64,
    pub std_dev: f64,
    pub bands: Vec<BandProbability>,
}

impl BucketDistribution {
    /// Bands by descending probability, ties kept in band order.
    pub fn ranked(&self) -> Vec<&BandProbability> {
        let mut ranked: Vec<&BandProbability> = self.bands.iter().collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked
    }

    pub fn most_likely(&self) -> Option<&BandProbability> {
        self.ranked().into_iter().next()
    }

    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.bands
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.probability)
    }

    pub fn total(&self) -> f64 {
        self.bands.iter().map(|b| b.probability).sum()
    }
}

/// Maps a forecast mean and spread onto an ordered band partition.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketMapper {
    bands: Vec<Band>,
    spread: BucketSpread,
}

impl BucketMapper {
    pub fn new(bands: Vec<Band>, spread: BucketSpread) -> Self {
        BucketMapper { bands, spread }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        BucketMapper::new(config.bands.clone(), config.bucket_spread)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Spread to use for `forecast`: the configured constant, or the
    /// standard deviation of the fitted count model.
    pub fn std_dev_for(&self, forecast: &RateForecast) -> f64 {
        match self.spread {
            BucketSpread::Fixed { std_dev } => std_dev,
            BucketSpread::Distribution => forecast.std_dev,
        }
    }

    /// Map a rate forecast using the configured spread.
    pub fn map_forecast(&self, forecast: &RateForecast) -> Result<BucketDistribution> {
        self.map(forecast.expected_total, self.std_dev_for(forecast))
    }

    /// Probabilities for `N(mean, std_dev²)` over the bands.
    ///
    /// Fails with `DegenerateDistribution` when no band receives any mass,
    /// e.g. a zero spread with the mean on a gap between integer edges.
    pub fn map(&self, mean: f64, std_dev: f64) -> Result<BucketDistribution> {
        if !(std_dev >= 0.0) || !std_dev.is_finite() {
            return Err(Error::InvalidParameter {
                name: "std_dev".to_string(),
                message: format!("must be finite and non-negative, got {std_dev}"),
            });
        }

        let raw: Vec<f64> = self
            .bands
            .iter()
            .map(|band| {
                let upper = band.upper.map(|u| u as f64);
                normal_interval(mean, std_dev, band.lower as f64, upper).max(0.0)
            })
            .collect();

        let sum: f64 = raw.iter().sum();
        if !(sum > 0.0) || !sum.is_finite() {
            return Err(Error::DegenerateDistribution { mean, std_dev });
        }

        let bands = self
            .bands
            .iter()
            .zip(raw)
            .map(|(band, p)| BandProbability {
                label: band.label.clone(),
                lower: band.lower,
                upper: band.upper,
                probability: p / sum,
            })
            .collect();

        Ok(BucketDistribution {
            mean,
            std_dev,
            bands,
        })
    }
}
