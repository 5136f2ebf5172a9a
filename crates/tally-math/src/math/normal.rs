//! Standard normal distribution.

use std::f64::consts::PI;

// Abramowitz & Stegun 26.2.17, |error| < 7.5e-8.
const AS_P: f64 = 0.231_641_9;
const AS_B: [f64; 5] = [
    0.319_381_530,
    -0.356_563_782,
    1.781_477_937,
    -1.821_255_978,
    1.330_274_429,
];

/// Density of N(0, 1) at z.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// CDF of N(0, 1) at z.
///
/// Saturates outside ±8. Computed on the upper half-line and reflected, so
/// `normal_cdf(-z) == 1 - normal_cdf(z)` holds exactly in floating point.
pub fn normal_cdf(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    if z < -8.0 {
        return 0.0;
    }
    if z > 8.0 {
        return 1.0;
    }
    if z < 0.0 {
        return 1.0 - normal_cdf(-z);
    }

    let t = 1.0 / (1.0 + AS_P * z);
    let mut poly = 0.0;
    let mut t_pow = t;
    for b in AS_B {
        poly += b * t_pow;
        t_pow *= t;
    }
    1.0 - normal_pdf(z) * poly
}

/// P(lower <= X < upper) for X ~ N(mean, std_dev^2); `upper = None` is open.
///
/// A zero std-dev degenerates to a point mass at `mean`.
pub fn normal_interval(mean: f64, std_dev: f64, lower: f64, upper: Option<f64>) -> f64 {
    let cdf = |x: f64| {
        if std_dev > 0.0 {
            normal_cdf((x - mean) / std_dev)
        } else if x > mean {
            1.0
        } else if x < mean {
            0.0
        } else {
            0.5
        }
    };
    match upper {
        Some(u) => cdf(u) - cdf(lower),
        None => 1.0 - cdf(lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn known_values() {
        assert!(approx_eq(normal_cdf(0.0), 0.5, 1e-7));
        assert!(approx_eq(normal_cdf(1.0), 0.841_344_746, 1e-7));
        assert!(approx_eq(normal_cdf(-1.96), 0.024_997_895, 1e-7));
        assert!(approx_eq(normal_cdf(2.326_347_874), 0.99, 1e-7));
    }

    #[test]
    fn saturates_in_tails() {
        assert_eq!(normal_cdf(-9.0), 0.0);
        assert_eq!(normal_cdf(9.0), 1.0);
    }

    #[test]
    fn reflection_is_exact() {
        for &z in &[0.1, 0.5, 1.3, 2.7, 5.0] {
            assert_eq!(normal_cdf(-z), 1.0 - normal_cdf(z));
        }
    }

    #[test]
    fn interval_open_upper() {
        let p = normal_interval(100.0, 10.0, 100.0, None);
        assert!(approx_eq(p, 0.5, 1e-7));
    }

    #[test]
    fn point_mass_interval() {
        assert_eq!(normal_interval(50.0, 0.0, 40.0, Some(65.0)), 1.0);
        assert_eq!(normal_interval(50.0, 0.0, 65.0, Some(90.0)), 0.0);
        assert_eq!(normal_interval(65.0, 0.0, 65.0, Some(90.0)), 0.5);
    }
}
