//! Regularized incomplete beta function.
//!
//! Used for the negative-binomial CDF: `P(X <= k) = I_p(r, k + 1)`.
//! Continued fraction per Numerical Recipes.

use super::stable::log_beta;

const BETACF_MAX_ITERS: usize = 500;
const BETACF_EPS: f64 = 1.0e-13;
const BETACF_FPMIN: f64 = 1.0e-300;

/// Regularized incomplete beta function I_x(a, b).
pub fn beta_cdf(x: f64, alpha: f64, beta: f64) -> f64 {
    if x.is_nan() || alpha.is_nan() || beta.is_nan() || alpha <= 0.0 || beta <= 0.0 {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bt = (alpha * x.ln() + beta * (-x).ln_1p() - log_beta(alpha, beta)).exp();
    let threshold = (alpha + 1.0) / (alpha + beta + 2.0);
    let out = if x < threshold {
        bt * betacf(alpha, beta, x) / alpha
    } else {
        1.0 - bt * betacf(beta, alpha, 1.0 - x) / beta
    };
    out.clamp(0.0, 1.0)
}

fn clamp_tiny(v: f64) -> f64 {
    if v.abs() < BETACF_FPMIN {
        BETACF_FPMIN
    } else {
        v
    }
}

fn betacf(alpha: f64, beta: f64, x: f64) -> f64 {
    let qab = alpha + beta;
    let qap = alpha + 1.0;
    let qam = alpha - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / clamp_tiny(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=BETACF_MAX_ITERS {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let aa = m_f * (beta - m_f) * x / ((qam + m2) * (alpha + m2));
        d = 1.0 / clamp_tiny(1.0 + aa * d);
        c = clamp_tiny(1.0 + aa / c);
        h *= d * c;

        let aa = -(alpha + m_f) * (qab + m_f) * x / ((alpha + m2) * (qap + m2));
        d = 1.0 / clamp_tiny(1.0 + aa * d);
        c = clamp_tiny(1.0 + aa / c);
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < BETACF_EPS {
            break;
        }
    }

    h
}
