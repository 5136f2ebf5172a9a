//! Negative binomial count distribution in mean/dispersion form.
//!
//! With mean `m` and dispersion `alpha > 0`: `r = 1/alpha`,
//! `p = 1 / (1 + alpha·m)`, so `E[X] = m` and `Var[X] = m + alpha·m²`.
//! As `alpha -> 0` it converges to Poisson(m).

use super::beta::beta_cdf;
use super::stable::{log_factorial, log_gamma, prob_from_log};

fn params(mean: f64, alpha: f64) -> Option<(f64, f64)> {
    if mean.is_nan() || alpha.is_nan() || mean < 0.0 || alpha <= 0.0 {
        return None;
    }
    Some((1.0 / alpha, 1.0 / (1.0 + alpha * mean)))
}

/// Log P(X = k).
pub fn log_pmf(k: u64, mean: f64, alpha: f64) -> f64 {
    let Some((r, p)) = params(mean, alpha) else {
        return f64::NAN;
    };
    if mean == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    let kf = k as f64;
    log_gamma(kf + r) - log_gamma(r) - log_factorial(k) + r * p.ln() + kf * (-p).ln_1p()
}

pub fn pmf(k: u64, mean: f64, alpha: f64) -> f64 {
    prob_from_log(log_pmf(k, mean, alpha))
}

/// P(X <= k) = I_p(r, k + 1).
pub fn cdf(k: u64, mean: f64, alpha: f64) -> f64 {
    let Some((r, p)) = params(mean, alpha) else {
        return f64::NAN;
    };
    if mean == 0.0 {
        return 1.0;
    }
    beta_cdf(p, r, k as f64 + 1.0)
}

pub fn var(mean: f64, alpha: f64) -> f64 {
    if params(mean, alpha).is_none() {
        return f64::NAN;
    }
    mean + alpha * mean * mean
}

/// Smallest k with P(X <= k) >= p.
pub fn quantile(p: f64, mean: f64, alpha: f64) -> u64 {
    if params(mean, alpha).is_none() || !(mean > 0.0) || !(p > 0.0) {
        return 0;
    }
    let p = p.min(1.0 - 1e-12);
    let sd = var(mean, alpha).sqrt();
    let start = (mean - 8.0 * sd).floor().max(0.0) as u64;
    let limit = (mean + 60.0 * sd + 100.0).ceil() as u64;

    let mut acc = if start == 0 {
        0.0
    } else {
        cdf(start - 1, mean, alpha)
    };
    for k in start..=limit {
        acc += pmf(k, mean, alpha);
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
    fn variance_is_overdispersed() {
        assert!(approx_eq(var(100.0, 0.1), 1100.0, 1e-9));
        assert!(approx_eq(var(0.0, 0.1), 0.0, 0.0));
    }

    #[test]
    fn pmf_sums_to_one() {
        let total: f64 = (0..2000).map(|k| pmf(k, 100.0, 0.1)).sum();
        assert!(approx_eq(total, 1.0, 1e-9));
    }

    #[test]
    fn pmf_mean_matches() {
        let m: f64 = (0..3000).map(|k| k as f64 * pmf(k, 100.0, 0.1)).sum();
        assert!(approx_eq(m, 100.0, 1e-6));
    }

    #[test]
    fn cdf_matches_pmf_sum() {
        let summed: f64 = (0..=80).map(|k| pmf(k, 100.0, 0.1)).sum();
        assert!(approx_eq(cdf(80, 100.0, 0.1), summed, 1e-9));
    }

    #[test]
    fn quantiles_at_mean_100() {
        assert_eq!(quantile(0.05, 100.0, 0.1), 52);
        assert_eq!(quantile(0.10, 100.0, 0.1), 60);
        assert_eq!(quantile(0.90, 100.0, 0.1), 144);
        assert_eq!(quantile(0.95, 100.0, 0.1), 160);
    }

    #[test]
    fn small_alpha_approaches_poisson() {
        let nb = pmf(100, 100.0, 1e-6);
        let pois = super::super::poisson::pmf(100, 100.0);
        assert!(approx_eq(nb, pois, 1e-6));
    }

    #[test]
    fn invalid_alpha_is_nan() {
        assert!(log_pmf(3, 10.0, 0.0).is_nan());
        assert!(cdf(3, 10.0, -1.0).is_nan());
        assert_eq!(quantile(0.5, 10.0, 0.0), 0);
    }
}
