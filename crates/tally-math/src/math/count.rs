//! Count distributions used for forecast uncertainty.

use serde::{Deserialize, Serialize};

use super::{negbinom, poisson};

/// A fitted count distribution over future events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum CountDistribution {
    Poisson { mean: f64 },
    /// Overdispersed: variance = mean + alpha · mean².
    NegBinom { mean: f64, alpha: f64 },
}

/// The four tail quantiles reported with every forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: u64,
    pub p10: u64,
    pub p90: u64,
    pub p95: u64,
}

impl CountDistribution {
    /// Build the distribution, collapsing a non-positive alpha to Poisson.
    pub fn new(mean: f64, alpha: Option<f64>) -> Self {
        match alpha {
            Some(a) if a > 0.0 => Self::NegBinom { mean, alpha: a },
            _ => Self::Poisson { mean },
        }
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Self::Poisson { mean } => poisson::mean(mean),
            Self::NegBinom { mean, .. } => mean,
        }
    }

    pub fn variance(&self) -> f64 {
        match *self {
            Self::Poisson { mean } => poisson::var(mean),
            Self::NegBinom { mean, alpha } => negbinom::var(mean, alpha),
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn cdf(&self, k: u64) -> f64 {
        match *self {
            Self::Poisson { mean } => poisson::cdf(k, mean),
            Self::NegBinom { mean, alpha } => negbinom::cdf(k, mean, alpha),
        }
    }

    pub fn quantile(&self, p: f64) -> u64 {
        match *self {
            Self::Poisson { mean } => poisson::quantile(p, mean),
            Self::NegBinom { mean, alpha } => negbinom::quantile(p, mean, alpha),
        }
    }

    pub fn percentiles(&self) -> Percentiles {
        Percentiles {
            p5: self.quantile(0.05),
            p10: self.quantile(0.10),
            p90: self.quantile(0.90),
            p95: self.quantile(0.95),
        }
    }
}
