//! Poisson count distribution.
//!
//! CDF goes through the regularized upper incomplete gamma function; quantiles
//! walk the mass function upward from a few standard deviations below the mean.

use super::gamma::gamma_q;
use super::stable::{log_factorial, prob_from_log};

/// Log P(X = k) for X ~ Poisson(lambda).
pub fn log_pmf(k: u64, lambda: f64) -> f64 {
    if lambda.is_nan() || lambda < 0.0 {
        return f64::NAN;
    }
    if lambda == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    (k as f64) * lambda.ln() - lambda - log_factorial(k)
}

pub fn pmf(k: u64, lambda: f64) -> f64 {
    prob_from_log(log_pmf(k, lambda))
}

/// P(X <= k).
pub fn cdf(k: u64, lambda: f64) -> f64 {
    if lambda.is_nan() || lambda < 0.0 {
        return f64::NAN;
    }
    if lambda == 0.0 {
        return 1.0;
    }
    gamma_q(k as f64 + 1.0, lambda)
}

pub fn mean(lambda: f64) -> f64 {
    lambda
}

pub fn var(lambda: f64) -> f64 {
    lambda
}

/// Smallest k with P(X <= k) >= p.
///
/// `p` is clamped into `[0, 1)`; `p <= 0` gives 0.
pub fn quantile(p: f64, lambda: f64) -> u64 {
    if !(lambda > 0.0) || !(p > 0.0) {
        return 0;
    }
    let p = p.min(1.0 - 1e-12);
    let sd = lambda.sqrt();
    let start = (lambda - 10.0 * sd - 10.0).floor().max(0.0) as u64;
    let limit = (lambda + 40.0 * sd + 100.0).ceil() as u64;

    let mut acc = if start == 0 { 0.0 } else { cdf(start - 1, lambda) };
    for k in start..=limit {
        acc += pmf(k, lambda);
        if acc >= p {
            return k;
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        (a - b).abs() <= tol
    }

    #[test]
    fn pmf_small_lambda() {
        let lambda: f64 = 2.0;
        assert!(approx_eq(pmf(0, lambda), (-2.0f64).exp(), 1e-12));
        assert!(approx_eq(pmf(3, lambda), (-2.0f64).exp() * 8.0 / 6.0, 1e-12));
    }

    #[test]
    fn cdf_matches_pmf_sum() {
        let lambda = 7.5;
        let summed: f64 = (0..=9).map(|k| pmf(k, lambda)).sum();
        assert!(approx_eq(cdf(9, lambda), summed, 1e-10));
    }

    #[test]
    fn quantiles_at_mean_100() {
        assert_eq!(quantile(0.05, 100.0), 84);
        assert_eq!(quantile(0.10, 100.0), 87);
        assert_eq!(quantile(0.90, 100.0), 113);
        assert_eq!(quantile(0.95, 100.0), 117);
    }

    #[test]
    fn quantiles_at_mean_200() {
        assert_eq!(quantile(0.10, 200.0), 182);
        assert_eq!(quantile(0.90, 200.0), 218);
    }

    #[test]
    fn zero_rate_is_point_mass() {
        assert_eq!(pmf(0, 0.0), 1.0);
        assert_eq!(pmf(1, 0.0), 0.0);
        assert_eq!(cdf(0, 0.0), 1.0);
        assert_eq!(quantile(0.95, 0.0), 0);
    }

    #[test]
    fn negative_rate_is_nan() {
        assert!(log_pmf(1, -1.0).is_nan());
        assert!(cdf(1, -1.0).is_nan());
    }
}
